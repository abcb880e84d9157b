use anyhow::Result;
use fansite::events::EventType;
use fansite::flows::profile::{submit, ProfileUpdateOutcome, PHOTO_UPDATED};
use fansite::forms::{ProfileUpdateForm, FOTO_FIELD};
use fansite::media::{UploadedFile, INVALID_FILE_NAME};
use fansite::profiles::DEFAULT_FOTO;

use super::IntegrationHarness;
use crate::support::accounts::register_fan;
use crate::support::images::{jpeg_bytes, png_bytes};

fn foto_of(site: &fansite::Site, account: &fansite::Account) -> Result<String> {
    let foto = site
        .db
        .read(|t| t.profile_for_account(&account.id).map(|p| p.foto.clone()))?;
    Ok(foto.expect("profile exists"))
}

#[test]
fn valid_photo_replaces_default() -> Result<()> {
    let harness = IntegrationHarness::new();
    let site = harness.site();
    let account = register_fan(&site, "romance")?;
    let bytes = png_bytes(32, 24);

    let form = ProfileUpdateForm::with_foto(UploadedFile::new("mi foto.png", bytes.clone()));
    let ProfileUpdateOutcome::Updated { profile, notice } = submit(&site, &account, form)? else {
        panic!("a valid image must be accepted");
    };
    assert_eq!(notice.text, PHOTO_UPDATED);
    assert_eq!(profile.foto, "fotos_perfil/mi_foto.png");
    assert_eq!(foto_of(&site, &account)?, profile.foto);
    assert_eq!(std::fs::read(site.media.path_of(&profile.foto))?, bytes);

    let event = site
        .events
        .load()?
        .into_iter()
        .find(|e| e.event_type == EventType::ProfilePhotoUpdated)
        .expect("photo update is audited");
    assert_eq!(event.details["previous"], DEFAULT_FOTO);
    assert_eq!(event.details["width"], 32);
    assert_eq!(event.details["height"], 24);
    Ok(())
}

#[test]
fn invalid_image_leaves_profile_untouched() -> Result<()> {
    let harness = IntegrationHarness::new();
    let site = harness.site();
    let account = register_fan(&site, "noimagen")?;

    let form = ProfileUpdateForm::with_foto(UploadedFile::new("notas.png", b"not an image".to_vec()));
    let ProfileUpdateOutcome::Rejected(page) = submit(&site, &account, form)? else {
        panic!("non-image bytes must be rejected");
    };
    assert_eq!(
        page.form.errors.field(FOTO_FIELD),
        ["Upload a valid image. The file you uploaded was either not an image or a corrupted image."]
    );
    assert!(page.foto.is_default);
    assert_eq!(foto_of(&site, &account)?, DEFAULT_FOTO);
    assert!(!site.media.root().join("fotos_perfil").join("notas.png").exists());
    Ok(())
}

#[test]
fn oversized_image_is_rejected() -> Result<()> {
    let harness = IntegrationHarness::new();
    let mut site = harness.site();
    site.config.uploads.max_image_bytes = 16;
    let account = register_fan(&site, "grande")?;

    let form = ProfileUpdateForm::with_foto(UploadedFile::new("grande.jpg", jpeg_bytes(64, 64)));
    let ProfileUpdateOutcome::Rejected(page) = submit(&site, &account, form)? else {
        panic!("images above the limit must be rejected");
    };
    assert!(page.form.errors.field(FOTO_FIELD)[0].starts_with("The file is too large"));
    assert_eq!(foto_of(&site, &account)?, DEFAULT_FOTO);
    Ok(())
}

#[test]
fn name_without_base_is_rejected_as_a_field_error() -> Result<()> {
    let harness = IntegrationHarness::new();
    let site = harness.site();
    let account = register_fan(&site, "sinnombre")?;

    let form = ProfileUpdateForm::with_foto(UploadedFile::new("a.png/", png_bytes(8, 8)));
    let ProfileUpdateOutcome::Rejected(page) = submit(&site, &account, form)? else {
        panic!("a name with no base part must be rejected");
    };
    assert_eq!(page.form.errors.field(FOTO_FIELD), [INVALID_FILE_NAME]);
    assert_eq!(foto_of(&site, &account)?, DEFAULT_FOTO);
    Ok(())
}

#[test]
fn submission_without_file_keeps_current_photo() -> Result<()> {
    let harness = IntegrationHarness::new();
    let site = harness.site();
    let account = register_fan(&site, "sincambio")?;

    let outcome = submit(&site, &account, ProfileUpdateForm::default())?;
    let ProfileUpdateOutcome::Updated { profile, .. } = outcome else {
        panic!("an empty submission is a no-op success");
    };
    assert_eq!(profile.foto, DEFAULT_FOTO);
    assert!(site
        .events
        .load()?
        .iter()
        .all(|e| e.event_type != EventType::ProfilePhotoUpdated));
    Ok(())
}

#[test]
fn same_file_name_never_overwrites_another_upload() -> Result<()> {
    let harness = IntegrationHarness::new();
    let site = harness.site();
    let first = register_fan(&site, "primero")?;
    let second = register_fan(&site, "segundo")?;
    let first_bytes = png_bytes(10, 10);
    let second_bytes = png_bytes(20, 20);

    submit(&site, &first, ProfileUpdateForm::with_foto(UploadedFile::new("portada.png", first_bytes.clone())))?;
    submit(&site, &second, ProfileUpdateForm::with_foto(UploadedFile::new("portada.png", second_bytes.clone())))?;

    let first_foto = foto_of(&site, &first)?;
    let second_foto = foto_of(&site, &second)?;
    assert_ne!(first_foto, second_foto);
    assert_eq!(std::fs::read(site.media.path_of(&first_foto))?, first_bytes);
    assert_eq!(std::fs::read(site.media.path_of(&second_foto))?, second_bytes);
    Ok(())
}

#[test]
fn updates_only_touch_the_callers_profile() -> Result<()> {
    let harness = IntegrationHarness::new();
    let site = harness.site();
    let owner = register_fan(&site, "dueno")?;
    let other = register_fan(&site, "vecino")?;

    submit(&site, &owner, ProfileUpdateForm::with_foto(UploadedFile::new("yo.png", png_bytes(8, 8))))?;

    assert_eq!(foto_of(&site, &owner)?, "fotos_perfil/yo.png");
    assert_eq!(foto_of(&site, &other)?, DEFAULT_FOTO);
    Ok(())
}
