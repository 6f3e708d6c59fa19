//! Playback grant pipeline shared by every front door
//!
//! Channel lookup, entitlement check, stream-slot reservation and signing run
//! in that order. The slot brackets only the signing step.

use std::time::Duration;
use tracing::{debug, info};

use crate::errors::{AppError, AppResult};
use crate::models::{Feature, PlaybackGrant, StreamQuality};
use crate::services::admission::StreamSlots;
use crate::services::catalog::CatalogService;
use crate::services::entitlements::EntitlementService;
use crate::services::signer::{CapabilitySigner, channel_selector};

#[derive(Clone)]
pub struct PlaybackService {
    catalog: CatalogService,
    entitlements: EntitlementService,
    slots: StreamSlots,
    signer: CapabilitySigner,
    capability_ttl: Duration,
}

impl PlaybackService {
    pub fn new(
        catalog: CatalogService,
        entitlements: EntitlementService,
        slots: StreamSlots,
        signer: CapabilitySigner,
        capability_ttl: Duration,
    ) -> Self {
        Self {
            catalog,
            entitlements,
            slots,
            signer,
            capability_ttl,
        }
    }

    pub async fn grant(
        &self,
        subscriber_id: &str,
        channel_id: &str,
        quality: StreamQuality,
    ) -> AppResult<PlaybackGrant> {
        let channel = self.catalog.playable_channel(channel_id).await?;
        let entitlement = self.entitlements.for_subscriber(subscriber_id).await?;

        for feature in std::iter::once(Feature::Live).chain(quality.required_feature()) {
            if !entitlement.allows(feature) {
                debug!(
                    subscriber_id = %subscriber_id,
                    feature = %feature,
                    plan = %entitlement.plan_slug,
                    "Playback refused by plan"
                );
                return Err(AppError::FeatureNotPermitted {
                    feature: feature.to_string(),
                    plan: entitlement.plan_slug.clone(),
                });
            }
        }

        if !self.signer.is_configured() {
            return Err(AppError::SigningUnavailable);
        }

        let reservation = self.slots.check_and_reserve(subscriber_id, &entitlement).await?;
        let signed = self
            .signer
            .sign(&channel_selector(&channel.id, quality), self.capability_ttl);
        reservation.close().await;
        let signed = signed?;

        info!(
            subscriber_id = %subscriber_id,
            channel_id = %channel.id,
            quality = %quality,
            expires_at = %signed.expires_at,
            "Playback granted"
        );

        Ok(PlaybackGrant {
            url: signed.url,
            expires_at: signed.expires_at,
            quality,
        })
    }
}
