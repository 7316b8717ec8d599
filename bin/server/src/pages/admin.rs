//! Admin console page.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use axum_extra::extract::cookie::CookieJar;
use labsite_access::{AdminAccess, GateState, IdentityProvider};
use leptos::prelude::*;
use std::sync::Arc;

use super::render_page;
use crate::auth::sync_session;
use crate::components::{AdminGateView, use_admin};
use crate::state::AppState;

/// `GET /admin`
pub async fn admin_page(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> impl IntoResponse {
    let provider = state.provider_for(&jar);
    let gate_state = state.admin_gate(provider.clone()).resolve().await;
    let designated = state.config.gate.designated_provider().clone();

    let jar = sync_session(jar, &provider);
    (jar, Html(render(gate_state, designated)))
}

/// Renders the admin console for a resolved gate state.
pub fn render(state: GateState<AdminAccess>, designated: IdentityProvider) -> String {
    render_page("Admin console", move || {
        view! {
            <AdminGateView state=state path="/admin" designated=designated>
                <AdminConsole/>
            </AdminGateView>
        }
    })
}

#[component]
fn AdminConsole() -> impl IntoView {
    let access = use_admin();
    let profile = access.profile();
    let name = profile
        .display_name()
        .or(access.session().display_name())
        .unwrap_or(profile.email())
        .to_string();
    let email = profile.email().to_string();
    let role = profile.role().to_string();
    let last_login = profile
        .last_login_at()
        .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "First sign-in".to_string());

    view! {
        <div class="admin-page">
            <header class="console-header">
                <h1>"Admin console"</h1>
                <a href="/auth/logout?next=/admin" rel="external" class="logout-button">
                    "Sign out"
                </a>
            </header>
            <dl class="admin-profile">
                <dt>"Name"</dt>
                <dd>{name}</dd>
                <dt>"Email"</dt>
                <dd>{email}</dd>
                <dt>"Role"</dt>
                <dd>{role}</dd>
                <dt>"Previous sign-in"</dt>
                <dd>{last_login}</dd>
            </dl>
        </div>
    }
}
