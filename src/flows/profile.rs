//! Authenticated profile page: show the current photo, accept a new one.
//!
//! Both entry points first make sure the caller has a profile, repairing
//! accounts that predate provisioning instead of failing.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use super::Notice;
use crate::accounts::Account;
use crate::events::EventType;
use crate::forms::{FormErrors, ProfileUpdateForm, FOTO_FIELD};
use crate::profiles::{ensure_profile, Profile};
use crate::site::Site;
use crate::store::StoreError;

pub const PHOTO_UPDATED: &str = "Your profile photo has been updated!";

#[derive(Debug, Clone, Serialize)]
pub struct FotoView {
    /// Stored reference, relative to the media root.
    pub name: String,
    pub url: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileFormView {
    /// Field name to its current value indicator.
    pub initial: serde_json::Value,
    pub errors: FormErrors,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfilePage {
    pub username: String,
    pub email: String,
    pub foto: FotoView,
    pub form: ProfileFormView,
}

#[derive(Debug)]
pub enum ProfileUpdateOutcome {
    /// Stored; redisplay the profile page.
    Updated { profile: Profile, notice: Notice },
    /// Nothing was written; show the page with errors.
    Rejected(ProfilePage),
}

/// The caller's profile and an unbound update form.
pub fn show(site: &Site, account: &Account) -> Result<ProfilePage> {
    let profile = load_or_repair(site, account)?;
    Ok(page(site, account, &profile, FormErrors::new()))
}

/// Applies a photo submission to the caller's own profile.
pub fn submit(site: &Site, account: &Account, form: ProfileUpdateForm) -> Result<ProfileUpdateOutcome> {
    let profile = load_or_repair(site, account)?;

    let image = match form.validate(site.config.uploads.max_image_bytes) {
        Ok(image) => image,
        Err(errors) => {
            info!(account = %account.id, "Profile photo rejected: {:?}", errors.field(FOTO_FIELD));
            return Ok(ProfileUpdateOutcome::Rejected(page(site, account, &profile, errors)));
        }
    };

    let Some(image) = image else {
        return Ok(ProfileUpdateOutcome::Updated {
            profile,
            notice: Notice::success(PHOTO_UPDATED),
        });
    };

    let stored = site.media.save(&image)?;
    let previous = profile.foto.clone();
    let updated = site
        .db
        .transaction(|tx| -> Result<Profile, StoreError> {
            let mut current = tx
                .profile_for_account(&account.id)
                .cloned()
                .ok_or(StoreError::NotFound {
                    entity: "profile",
                    id: account.id,
                })?;
            current.set_foto(stored.reference.clone());
            tx.update_profile(current.clone())?;
            Ok(current)
        })
        .with_context(|| format!("Failed saving photo for account {}", account.id))?;

    info!(account = %account.id, foto = %updated.foto, "Profile photo updated");
    site.events.record(
        EventType::ProfilePhotoUpdated,
        Some(account.id),
        json!({
            "previous": previous,
            "foto": updated.foto,
            "sha256": stored.sha256,
            "width": image.width,
            "height": image.height,
        }),
    );
    Ok(ProfileUpdateOutcome::Updated {
        profile: updated,
        notice: Notice::success(PHOTO_UPDATED),
    })
}

fn load_or_repair(site: &Site, account: &Account) -> Result<Profile> {
    let lookup = ensure_profile(&site.db, &account.id)
        .with_context(|| format!("Failed loading profile for account {}", account.id))?;
    if lookup.was_repaired() {
        site.events.record(
            EventType::ProfileRepaired,
            Some(account.id),
            json!({ "profile_id": lookup.profile().id }),
        );
    }
    Ok(lookup.into_profile())
}

fn page(site: &Site, account: &Account, profile: &Profile, errors: FormErrors) -> ProfilePage {
    ProfilePage {
        username: account.username.clone(),
        email: account.email.clone(),
        foto: FotoView {
            name: profile.foto.clone(),
            url: site.media.url(&profile.foto),
            is_default: profile.has_default_foto(),
        },
        form: ProfileFormView {
            initial: json!({ FOTO_FIELD: profile.foto }),
            errors,
        },
    }
}
