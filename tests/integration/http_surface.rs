use anyhow::Result;
use axum::http::StatusCode;
use fansite::flows::profile::PHOTO_UPDATED;
use fansite::forms::login::INVALID_LOGIN;
use fansite::web::{router, AppState};
use fansite::Site;
use tower::ServiceExt;

use super::IntegrationHarness;
use crate::support::accounts::PASSWORD;
use crate::support::http::{
    get, json_body, location, messages, post_form, post_multipart, set_cookie, MultipartBody,
};
use crate::support::images::png_bytes;

fn registration_fields<'a>(username: &'a str) -> [(&'a str, &'a str); 4] {
    [
        ("username", username),
        ("email", "fan@example.com"),
        ("password1", PASSWORD),
        ("password2", PASSWORD),
    ]
}

#[tokio::test]
async fn anonymous_profile_request_redirects_to_login() -> Result<()> {
    let harness = IntegrationHarness::new();
    let app = router(harness.app_state());

    let response = app.oneshot(get("/perfil/", None)).await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/login/?next=%2Fperfil%2F");
    Ok(())
}

#[tokio::test]
async fn static_pages_render_for_anonymous_visitors() -> Result<()> {
    let harness = IntegrationHarness::new();
    let app = router(harness.app_state());

    let response = app.clone().oneshot(get("/musica/", None)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let page = json_body(response).await;
    assert_eq!(page["page"], "musica_disponible");
    assert!(page["user"].is_null());

    let home = json_body(app.oneshot(get("/", None)).await?).await;
    assert_eq!(home["page"], "inicio");
    Ok(())
}

#[tokio::test]
async fn register_login_and_replace_photo() -> Result<()> {
    let harness = IntegrationHarness::new();
    let app = router(harness.app_state());

    let response = app
        .clone()
        .oneshot(post_form("/registro/", &registration_fields("cantante"), None))
        .await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/login/");
    let anonymous = set_cookie(&response).expect("notice stored in a new session");

    let login_page = json_body(
        app.clone()
            .oneshot(get("/login/?next=%2Fperfil%2F", Some(&anonymous)))
            .await?,
    )
    .await;
    assert_eq!(
        messages(&login_page),
        ["Account created for cantante! You can now log in."]
    );
    assert_eq!(login_page["form"]["next"], "/perfil/");

    let response = app
        .clone()
        .oneshot(post_form(
            "/login/",
            &[("username", "cantante"), ("password", PASSWORD), ("next", "/perfil/")],
            Some(&anonymous),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/perfil/");
    let session = set_cookie(&response).expect("login issues a session cookie");
    assert_ne!(session, anonymous);

    let profile = json_body(app.clone().oneshot(get("/perfil/", Some(&session))).await?).await;
    assert_eq!(profile["username"], "cantante");
    assert_eq!(profile["foto"]["is_default"], true);

    let upload = MultipartBody::new().file("foto", "escenario.png", "image/png", &png_bytes(16, 16));
    let response = app
        .clone()
        .oneshot(post_multipart("/perfil/", upload, Some(&session)))
        .await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/perfil/");

    let profile = json_body(app.clone().oneshot(get("/perfil/", Some(&session))).await?).await;
    assert_eq!(profile["foto"]["is_default"], false);
    assert_eq!(profile["foto"]["url"], "/media/fotos_perfil/escenario.png");
    assert_eq!(messages(&profile), [PHOTO_UPDATED]);

    let media = app
        .oneshot(get("/media/fotos_perfil/escenario.png", None))
        .await?;
    assert_eq!(media.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn invalid_upload_renders_errors_without_redirect() -> Result<()> {
    let harness = IntegrationHarness::new();
    let app = router(harness.app_state());
    app.clone()
        .oneshot(post_form("/registro/", &registration_fields("errante"), None))
        .await?;
    let response = app
        .clone()
        .oneshot(post_form(
            "/login/",
            &[("username", "errante"), ("password", PASSWORD)],
            None,
        ))
        .await?;
    assert_eq!(location(&response), "/");
    let session = set_cookie(&response).expect("session cookie");

    let upload = MultipartBody::new().file("foto", "texto.gif", "image/gif", b"GIF89a?");
    let response = app
        .oneshot(post_multipart("/perfil/", upload, Some(&session)))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let page = json_body(response).await;
    assert!(page["form"]["errors"]["foto"][0]
        .as_str()
        .is_some_and(|m| m.starts_with("Upload a valid image.")));
    assert_eq!(page["foto"]["is_default"], true);
    Ok(())
}

#[tokio::test]
async fn wrong_password_shows_generic_error() -> Result<()> {
    let harness = IntegrationHarness::new();
    let app = router(harness.app_state());
    app.clone()
        .oneshot(post_form("/registro/", &registration_fields("olvidadizo"), None))
        .await?;

    let response = app
        .oneshot(post_form(
            "/login/",
            &[("username", "olvidadizo"), ("password", "incorrecta-123")],
            None,
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response).is_none());
    let page = json_body(response).await;
    assert_eq!(page["errors"]["__all__"][0], INVALID_LOGIN);
    assert_eq!(page["form"]["username"], "olvidadizo");
    assert!(page["form"].get("password").is_none());
    Ok(())
}

#[tokio::test]
async fn logout_ends_the_session() -> Result<()> {
    let harness = IntegrationHarness::new();
    let app = router(harness.app_state());
    app.clone()
        .oneshot(post_form("/registro/", &registration_fields("despedida"), None))
        .await?;
    let response = app
        .clone()
        .oneshot(post_form(
            "/login/",
            &[("username", "despedida"), ("password", PASSWORD)],
            None,
        ))
        .await?;
    let session = set_cookie(&response).expect("session cookie");

    let home = json_body(app.clone().oneshot(get("/", Some(&session))).await?).await;
    assert_eq!(home["user"], "despedida");

    let response = app.clone().oneshot(get("/logout/", Some(&session))).await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");

    let response = app.oneshot(get("/perfil/", Some(&session))).await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).starts_with("/login/"));
    Ok(())
}

#[tokio::test]
async fn oversized_upload_is_a_form_error_not_a_transport_error() -> Result<()> {
    let harness = IntegrationHarness::new();
    let app = router(harness.app_state());
    app.clone()
        .oneshot(post_form("/registro/", &registration_fields("desbordado"), None))
        .await?;
    let response = app
        .clone()
        .oneshot(post_form(
            "/login/",
            &[("username", "desbordado"), ("password", PASSWORD)],
            None,
        ))
        .await?;
    let session = set_cookie(&response).expect("session cookie");

    let six_mib = vec![0u8; 6 * 1024 * 1024];
    let upload = MultipartBody::new().file("foto", "grande.png", "image/png", &six_mib);
    let response = app
        .oneshot(post_multipart("/perfil/", upload, Some(&session)))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let page = json_body(response).await;
    assert_eq!(
        page["form"]["errors"]["foto"][0],
        "The file is too large (6291456 bytes). The maximum size is 5242880 bytes."
    );
    assert_eq!(page["foto"]["is_default"], true);
    Ok(())
}

#[tokio::test]
async fn bodies_past_the_request_cap_are_refused() -> Result<()> {
    let harness = IntegrationHarness::new();
    let mut config = IntegrationHarness::config();
    config.uploads.max_image_bytes = 1024;
    config.uploads.max_request_bytes = 128 * 1024;
    let app = router(AppState::new(Site::open(harness.paths(), config)?));

    let long_name = "x".repeat(256 * 1024);
    let response = app
        .oneshot(post_form("/registro/", &[("username", long_name.as_str())], None))
        .await?;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    Ok(())
}
