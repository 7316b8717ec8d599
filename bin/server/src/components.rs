//! Gate views and the session accessors they provide.
//!
//! A gate view renders its children only when the gate is `Ready`, after
//! providing the resolved payload as context. Every other state renders a
//! self-contained status view.

use labsite_access::{
    AdminAccess, ContextError, ForbiddenReason, GateState, IdentityProvider, Notice,
    SessionContext,
};
use leptos::prelude::*;
use rootcause::prelude::Report;

/// Returns the member session provided by the enclosing [`MemberGateView`].
///
/// # Panics
///
/// Panics when called outside a ready member gate.
pub fn use_session() -> SessionContext {
    try_use_session().unwrap_or_else(|err| panic!("{err}"))
}

/// Returns the member session, or an error outside a ready member gate.
pub fn try_use_session() -> Result<SessionContext, Report<ContextError>> {
    use_context::<SessionContext>().ok_or_else(|| ContextError::OutsideGate.into())
}

/// Returns the admin access provided by the enclosing [`AdminGateView`].
///
/// # Panics
///
/// Panics when called outside a ready admin gate.
pub fn use_admin() -> AdminAccess {
    expect_context::<AdminAccess>()
}

/// Admin gate: designated provider only.
#[component]
pub fn AdminGateView(
    state: GateState<AdminAccess>,
    #[prop(into)] path: String,
    designated: IdentityProvider,
    children: Children,
) -> impl IntoView {
    match state {
        GateState::Loading => view! { <LoadingView/> }.into_any(),
        GateState::Unauthenticated { notice } => view! {
            <SignInPrompt
                heading="Admin sign-in"
                path=path
                notice=notice
                providers=vec![designated]
            />
        }
        .into_any(),
        GateState::Forbidden { reason } => {
            view! { <ForbiddenView reason=reason path=path/> }.into_any()
        }
        GateState::Ready(access) => {
            provide_context(access);
            children().into_any()
        }
    }
}

/// Member gate: any provider, team-directory match required.
#[component]
pub fn MemberGateView(
    state: GateState<SessionContext>,
    #[prop(into)] path: String,
    children: Children,
) -> impl IntoView {
    match state {
        GateState::Loading => view! { <LoadingView/> }.into_any(),
        GateState::Unauthenticated { notice } => view! {
            <SignInPrompt
                heading="Member sign-in"
                path=path
                notice=notice
                providers=vec![IdentityProvider::Google, IdentityProvider::Github]
            />
        }
        .into_any(),
        GateState::Forbidden { reason } => {
            view! { <ForbiddenView reason=reason path=path/> }.into_any()
        }
        GateState::Ready(context) => {
            provide_context(context);
            children().into_any()
        }
    }
}

#[component]
fn LoadingView() -> impl IntoView {
    view! {
        <div class="gate gate-loading" aria-busy="true">
            <p>"Checking your access..."</p>
        </div>
    }
}

#[component]
fn SignInPrompt(
    heading: &'static str,
    path: String,
    notice: Option<Notice>,
    providers: Vec<IdentityProvider>,
) -> impl IntoView {
    let notice = notice.map(|notice| {
        view! { <p class="gate-notice" role="alert">{notice.message()}</p> }
    });
    let links = providers
        .into_iter()
        .map(|provider| {
            let href = format!("/auth/login?next={}&provider={}", path, provider.as_str());
            let label = format!("Sign in with {}", provider.label());
            view! {
                <a href=href rel="external" class="login-button">{label}</a>
            }
        })
        .collect_view();

    view! {
        <div class="gate gate-sign-in">
            <div class="login-box">
                <h1>{heading}</h1>
                {notice}
                {links}
            </div>
        </div>
    }
}

#[component]
fn ForbiddenView(reason: ForbiddenReason, path: String) -> impl IntoView {
    let heading = match reason {
        ForbiddenReason::NotInDirectory => "Almost there",
        ForbiddenReason::Unverified => "Temporarily unavailable",
        ForbiddenReason::NotAllowlisted | ForbiddenReason::MissingEmail => "Access denied",
    };
    let retry = (reason == ForbiddenReason::Unverified).then(|| {
        let href = path.clone();
        view! { <a href=href class="cta-button">"Try again"</a> }
    });
    let logout = format!("/auth/logout?next={path}");

    view! {
        <div class="gate gate-forbidden">
            <h1>{heading}</h1>
            <p class="gate-message">{reason.message()}</p>
            {retry}
            <a href=logout rel="external" class="logout-button">"Sign out"</a>
        </div>
    }
}
