//! Landing page.

use axum::response::Html;
use leptos::prelude::*;

use super::render_page;

/// `GET /`
pub async fn home_page() -> Html<String> {
    Html(render_page("Home", || view! { <HomePage/> }))
}

#[component]
fn HomePage() -> impl IntoView {
    view! {
        <div class="home-page">
            <h1>"Lab"</h1>
            <p>"Team members can update their profile in the member portal."</p>
            <a href="/portal" class="cta-button">"Member portal"</a>
            <a href="/admin" class="cta-button">"Admin console"</a>
        </div>
    }
}
