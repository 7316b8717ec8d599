//! Server-rendered pages.
//!
//! Each protected page resolves its gate for the request, then renders the
//! gate view around the page body.

pub mod admin;
pub mod home;
pub mod portal;

use leptos::prelude::*;
use leptos::tachys::view::RenderHtml;

pub use admin::admin_page;
pub use home::home_page;
pub use portal::{portal_page, refresh_profile};

/// Renders `content` inside the site shell.
pub fn render_page<F, V>(title: &str, content: F) -> String
where
    F: FnOnce() -> V,
    V: IntoView,
{
    let owner = Owner::new();
    let body = owner.with(|| content().to_html());

    format!(
        "<!DOCTYPE html>\
         <html lang=\"en\">\
         <head>\
         <meta charset=\"utf-8\"/>\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"/>\
         <title>{title} · Lab</title>\
         </head>\
         <body>{body}</body>\
         </html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_has_doctype_and_title() {
        let html = render_page("Portal", || view! { <p>"hello"</p> });
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Portal · Lab</title>"));
        assert!(html.contains("<p>hello</p>"));
    }
}
