// Form pages: registration wizards, profile settings, test-drive booking

use askama::Template;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::{plain_options, render, session_cookie, Nav, SelectOption};
use crate::{
    auth_middleware::AuthenticatedUser,
    backend::BackendError,
    booking::{book_test_drive, TestDriveForm},
    error::AppError,
    models::SignUpOutcome,
    registration::{
        register_dealer, register_seller, DealerForm, SellerForm, AVERAGE_LISTINGS, DEALERSHIP_TYPES,
        DEALER_FIELD_STEPS, DEALER_STEPS, IRISH_COUNTIES, NOTIFICATION_PREFERENCES, SELLER_FIELD_STEPS,
        SELLER_STEPS, SUBSCRIPTION_PLANS,
    },
    wizard::{hidden_fields, HiddenField, Transition, Wizard, WizardAction},
    AppState,
};

pub struct CheckOption {
    pub name: String,
    pub label: String,
    pub checked: bool,
}

pub struct PlanOption {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub selected: bool,
}

/// Where a finished registration lands: signed in when the backend handed
/// back a session, otherwise the sign-in page with a confirmation notice.
async fn finish_registration(app_state: &AppState, jar: CookieJar, outcome: SignUpOutcome) -> Response {
    match outcome.session {
        Some(session) => {
            if let Err(e) = app_state
                .sessions
                .refresh(&session.access_token, app_state.backend.as_ref())
                .await
            {
                tracing::warn!("Registered but could not load the new session: {}", e);
            }
            (jar.add(session_cookie(session.access_token)), Redirect::to("/")).into_response()
        }
        None => Redirect::to("/login?registered=1").into_response(),
    }
}

// --- Dealer registration ---

#[derive(Template)]
#[template(path = "dealer_register.html")]
struct DealerTemplate {
    nav: Nav,
    step: u8,
    steps: u8,
    is_last: bool,
    error: String,
    hidden: Vec<HiddenField>,
    form: DealerForm,
    counties: Vec<SelectOption>,
    dealership_types: Vec<SelectOption>,
    listings: Vec<SelectOption>,
    plans: Vec<PlanOption>,
    media: Vec<CheckOption>,
    use_same_address: bool,
}

impl DealerTemplate {
    fn new(nav: Nav, wizard: Wizard, form: DealerForm, error: String) -> Self {
        let media = [("photos", "Photos"), ("videos", "Videos"), ("three_sixty", "360° views")]
            .into_iter()
            .map(|(name, label)| CheckOption {
                name: name.to_string(),
                label: label.to_string(),
                checked: form.is_checked(name),
            })
            .collect();
        DealerTemplate {
            nav,
            step: wizard.step(),
            steps: wizard.steps(),
            is_last: wizard.is_terminal(),
            error,
            hidden: hidden_fields(&form, &DEALER_FIELD_STEPS, wizard.step()),
            counties: plain_options(&IRISH_COUNTIES, &form.county),
            dealership_types: plain_options(&DEALERSHIP_TYPES, &form.dealership_type),
            listings: plain_options(&AVERAGE_LISTINGS, &form.average_listings),
            plans: SUBSCRIPTION_PLANS
                .iter()
                .map(|plan| PlanOption {
                    id: plan.id,
                    name: plan.name,
                    description: plan.description,
                    selected: plan.id == form.subscription_plan,
                })
                .collect(),
            media,
            use_same_address: form.is_checked("use_same_address"),
            form,
        }
    }
}

pub async fn dealer_page(user: Option<AuthenticatedUser>) -> Result<impl IntoResponse, AppError> {
    let template = DealerTemplate::new(Nav::for_user(&user), Wizard::new(DEALER_STEPS), DealerForm::default(), String::new());
    render(&template)
}

pub async fn submit_dealer(
    State(app_state): State<AppState>,
    user: Option<AuthenticatedUser>,
    jar: CookieJar,
    Form(form): Form<DealerForm>,
) -> Result<Response, AppError> {
    let nav = Nav::for_user(&user);
    let wizard = Wizard::at(&form.step, DEALER_STEPS);
    tracing::info!("[HANDLER] POST /register/dealer - step {} action '{}'", wizard.step(), form.action);

    match wizard.handle(WizardAction::parse(&form.action)) {
        Transition::Show(next) => Ok(render(&DealerTemplate::new(nav, next, form, String::new()))?.into_response()),
        Transition::Submit(last) => match register_dealer(app_state.backend.as_ref(), &form).await {
            Ok(outcome) => Ok(finish_registration(&app_state, jar, outcome).await),
            Err(e) => {
                tracing::warn!("Dealer registration failed: {}", e);
                Ok(render(&DealerTemplate::new(nav, last, form, e.to_string()))?.into_response())
            }
        },
    }
}

// --- Private seller registration ---

#[derive(Template)]
#[template(path = "seller_register.html")]
struct SellerTemplate {
    nav: Nav,
    step: u8,
    steps: u8,
    is_last: bool,
    error: String,
    hidden: Vec<HiddenField>,
    form: SellerForm,
    counties: Vec<SelectOption>,
    contact_methods: Vec<SelectOption>,
    notifications: Vec<CheckOption>,
    marketing_consent: bool,
    accept_terms: bool,
}

impl SellerTemplate {
    fn new(nav: Nav, wizard: Wizard, form: SellerForm, error: String) -> Self {
        let contact = form.preferred_contact.as_str();
        SellerTemplate {
            nav,
            step: wizard.step(),
            steps: wizard.steps(),
            is_last: wizard.is_terminal(),
            error,
            hidden: hidden_fields(&form, &SELLER_FIELD_STEPS, wizard.step()),
            counties: plain_options(&IRISH_COUNTIES, &form.county),
            contact_methods: vec![
                SelectOption::new("email", "E-mail", contact == "email"),
                SelectOption::new("phone", "Phone", contact == "phone"),
                SelectOption::new("both", "E-mail and phone", contact == "both"),
            ],
            notifications: NOTIFICATION_PREFERENCES
                .iter()
                .map(|pref| CheckOption {
                    name: format!("notify_{}", pref.id),
                    label: pref.label.to_string(),
                    checked: form.is_checked(pref.id),
                })
                .collect(),
            marketing_consent: form.is_checked("marketing_consent"),
            accept_terms: form.is_checked("accept_terms"),
            form,
        }
    }
}

pub async fn seller_page(user: Option<AuthenticatedUser>) -> Result<impl IntoResponse, AppError> {
    let template = SellerTemplate::new(Nav::for_user(&user), Wizard::new(SELLER_STEPS), SellerForm::default(), String::new());
    render(&template)
}

pub async fn submit_seller(
    State(app_state): State<AppState>,
    user: Option<AuthenticatedUser>,
    jar: CookieJar,
    Form(form): Form<SellerForm>,
) -> Result<Response, AppError> {
    let nav = Nav::for_user(&user);
    let wizard = Wizard::at(&form.step, SELLER_STEPS);
    tracing::info!("[HANDLER] POST /register/seller - step {} action '{}'", wizard.step(), form.action);

    match wizard.handle(WizardAction::parse(&form.action)) {
        Transition::Show(next) => Ok(render(&SellerTemplate::new(nav, next, form, String::new()))?.into_response()),
        Transition::Submit(last) => match register_seller(app_state.backend.as_ref(), &form).await {
            Ok(outcome) => Ok(finish_registration(&app_state, jar, outcome).await),
            Err(e) => {
                tracing::warn!("Seller registration failed: {}", e);
                Ok(render(&SellerTemplate::new(nav, last, form, e.to_string()))?.into_response())
            }
        },
    }
}

// --- Profile settings ---

#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub full_name: String,
}

#[derive(Template)]
#[template(path = "profile.html")]
struct ProfileTemplate {
    nav: Nav,
    full_name: String,
    email: String,
    account_type: String,
    notice: String,
    error: String,
}

impl ProfileTemplate {
    fn new(auth: &AuthenticatedUser, notice: String, error: String) -> Self {
        let profile = auth.user.profile.as_ref();
        ProfileTemplate {
            nav: Nav::for_user(&Some(auth.clone())),
            full_name: profile.map(|p| p.full_name.clone()).unwrap_or_default(),
            email: auth.user.email.clone().unwrap_or_default(),
            account_type: profile.map(|p| p.user_type.label().to_string()).unwrap_or_default(),
            notice,
            error,
        }
    }
}

pub async fn profile_page(user: Option<AuthenticatedUser>) -> Result<Response, AppError> {
    let Some(auth) = user else {
        return Ok(Redirect::to("/login").into_response());
    };
    Ok(render(&ProfileTemplate::new(&auth, String::new(), String::new()))?.into_response())
}

pub async fn update_profile(
    State(app_state): State<AppState>,
    user: Option<AuthenticatedUser>,
    Form(form): Form<ProfileForm>,
) -> Result<Response, AppError> {
    let Some(mut auth) = user else {
        return Ok(Redirect::to("/login").into_response());
    };
    tracing::info!("[HANDLER] POST /profile - user {}", auth.user.id);

    let backend = app_state.backend.as_ref();
    if let Err(e) = backend
        .update_profile_name(&auth.user.id, form.full_name.trim(), &auth.access_token)
        .await
    {
        tracing::warn!("Profile update failed for {}: {}", auth.user.id, e);
        return Ok(render(&ProfileTemplate::new(&auth, String::new(), e.to_string()))?.into_response());
    }

    if let Some(fresh) = app_state.sessions.refresh(&auth.access_token, backend).await? {
        auth.user = fresh;
    }
    Ok(render(&ProfileTemplate::new(&auth, "Profile updated".to_string(), String::new()))?.into_response())
}

// --- Test-drive booking ---

#[derive(Template)]
#[template(path = "test_drive.html")]
struct TestDriveTemplate {
    nav: Nav,
    vehicle_id: String,
    vehicle_title: String,
    form: TestDriveForm,
    notice: String,
    error: String,
}

pub async fn test_drive_page(
    State(app_state): State<AppState>,
    user: Option<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    if user.is_none() {
        return Ok(Redirect::to("/login").into_response());
    }
    let vehicle = app_state
        .backend
        .get_vehicle(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Vehicle {} not found", id)))?;

    let template = TestDriveTemplate {
        nav: Nav::for_user(&user),
        vehicle_title: vehicle.title(),
        vehicle_id: vehicle.id,
        form: TestDriveForm::default(),
        notice: String::new(),
        error: String::new(),
    };
    Ok(render(&template)?.into_response())
}

pub async fn submit_test_drive(
    State(app_state): State<AppState>,
    user: Option<AuthenticatedUser>,
    Path(id): Path<String>,
    Form(form): Form<TestDriveForm>,
) -> Result<Response, AppError> {
    let Some(auth) = user else {
        return Ok(Redirect::to("/login").into_response());
    };
    let vehicle = app_state
        .backend
        .get_vehicle(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Vehicle {} not found", id)))?;

    let outcome = match form.to_booking(&vehicle.id, &auth.user.id) {
        Ok(booking) => book_test_drive(app_state.backend.as_ref(), &booking, &auth.access_token)
            .await
            .map_err(|e: BackendError| e.to_string()),
        Err(message) => Err(message),
    };

    let (notice, error) = match outcome {
        Ok(()) => ("Test drive requested. The seller will confirm your slot.".to_string(), String::new()),
        Err(message) => {
            tracing::warn!("Test drive request for {} failed: {}", vehicle.id, message);
            (String::new(), message)
        }
    };
    let template = TestDriveTemplate {
        nav: Nav::for_user(&Some(auth)),
        vehicle_title: vehicle.title(),
        vehicle_id: vehicle.id,
        form,
        notice,
        error,
    };
    Ok(render(&template)?.into_response())
}
