//! Member portal page.

use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use labsite_access::{GateState, SessionContext};
use leptos::prelude::*;
use std::sync::Arc;

use super::render_page;
use crate::auth::sync_session;
use crate::components::{MemberGateView, use_session};
use crate::state::AppState;

/// `GET /portal`
pub async fn portal_page(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> impl IntoResponse {
    let provider = state.provider_for(&jar);
    let gate_state = state.member_gate(provider.clone()).resolve().await;

    let jar = sync_session(jar, &provider);
    (jar, Html(render(gate_state)))
}

/// `POST /portal/refresh`: re-reads the member record, then shows the portal.
pub async fn refresh_profile(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> impl IntoResponse {
    let provider = state.provider_for(&jar);
    let gate = state.member_gate(provider.clone());
    gate.resolve().await;

    match gate.context() {
        Ok(context) => {
            if let Err(e) = context.refresh_member().await {
                tracing::warn!(error = %e, "member refresh failed");
            }
        }
        Err(e) => tracing::debug!(error = %e, "refresh requested outside member gate"),
    }

    (sync_session(jar, &provider), Redirect::to("/portal"))
}

/// Renders the member portal for a resolved gate state.
pub fn render(state: GateState<SessionContext>) -> String {
    render_page("Member portal", move || {
        view! {
            <MemberGateView state=state path="/portal">
                <MemberPortal/>
            </MemberGateView>
        }
    })
}

#[component]
fn MemberPortal() -> impl IntoView {
    let session = use_session();
    let member = session.member();
    let user = session.user();

    let name = member
        .display_name()
        .or(user.display_name())
        .unwrap_or(member.email())
        .to_string();
    let email = member.email().to_string();
    let title = member.title().map(str::to_string);
    let provider = user.provider().label().to_string();
    let avatar = member
        .avatar_url()
        .or(user.avatar_url())
        .map(str::to_string)
        .map(|src| view! { <img class="avatar" src=src alt=""/> });

    view! {
        <div class="portal-page">
            <header class="portal-header">
                {avatar}
                <h1>{name}</h1>
                <a href="/auth/logout?next=/portal" rel="external" class="logout-button">
                    "Sign out"
                </a>
            </header>
            <dl class="member-profile">
                <dt>"Email"</dt>
                <dd>{email}</dd>
                <dt>"Title"</dt>
                <dd>{title.unwrap_or_else(|| "Not set".to_string())}</dd>
                <dt>"Signed in with"</dt>
                <dd>{provider}</dd>
            </dl>
            <form method="post" action="/portal/refresh">
                <button type="submit">"Refresh profile"</button>
            </form>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labsite_access::memory::{InMemoryDirectory, InMemorySessionProvider};
    use labsite_access::{
        ForbiddenReason, GateConfig, IdentityProvider, MemberGate, MemberProfile, Session,
    };

    #[tokio::test]
    async fn ready_member_sees_profile() {
        let provider = Arc::new(InMemorySessionProvider::with_session(
            Session::new("gh-7".into(), IdentityProvider::Github).with_email("grace@lab.edu"),
        ));
        let directory = Arc::new(InMemoryDirectory::new().with_member(
            MemberProfile::new("grace@lab.edu")
                .with_display_name("Grace")
                .with_title("Postdoc"),
        ));
        let gate = MemberGate::member(provider, directory, GateConfig::default());

        let html = render(gate.resolve().await);

        assert!(html.contains("Grace"));
        assert!(html.contains("Postdoc"));
        assert!(html.contains("GitHub"));
        assert!(html.contains("/portal/refresh"));
    }

    #[test]
    fn signed_out_visitor_can_pick_any_provider() {
        let html = render(GateState::Unauthenticated { notice: None });

        assert!(html.contains("Member sign-in"));
        assert!(html.contains("provider=google"));
        assert!(html.contains("provider=github"));
        assert!(!html.contains("member-profile"));
    }

    #[test]
    fn unknown_member_is_told_to_ask_an_admin() {
        let html = render(GateState::Forbidden {
            reason: ForbiddenReason::NotInDirectory,
        });

        assert!(html.contains("Ask a lab admin"));
        assert!(html.contains("/auth/logout?next=/portal"));
        assert!(!html.contains("member-profile"));
    }

    #[test]
    fn unverified_member_can_retry() {
        let html = render(GateState::Forbidden {
            reason: ForbiddenReason::Unverified,
        });

        assert!(html.contains("Try again"));
    }
}
