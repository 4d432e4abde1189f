//! Image resolution helpers for the Scaleway backend.

use std::future::Future;

use crate::backend::ResourceSpec;
use scaleway_rs::{ScalewayImage, ScalewayListInstanceImagesBuilder};

use super::super::{ScalewayBackend, ScalewayBackendError};

impl ScalewayBackend {
    pub(in crate::scaleway) async fn resolve_image_id(
        &self,
        spec: &ResourceSpec,
    ) -> Result<String, ScalewayBackendError> {
        self.resolve_image_id_with(
            spec,
            || async move {
                let mut scoped =
                    ScalewayListInstanceImagesBuilder::new(self.api.clone(), &spec.zone)
                        .public(false)
                        .project(&spec.project_id)
                        .name(&spec.image_label)
                        .arch(&spec.architecture);
                if let Some(org) = &spec.organisation_id {
                    scoped = scoped.organization(org);
                }
                scoped.run_async().await.map_err(ScalewayBackendError::from)
            },
            || async move {
                ScalewayListInstanceImagesBuilder::new(self.api.clone(), &spec.zone)
                    .public(true)
                    .name(&spec.image_label)
                    .arch(&spec.architecture)
                    .run_async()
                    .await
                    .map_err(ScalewayBackendError::from)
            },
        )
        .await
    }

    /// Looks up project images first and falls back to public images only
    /// when the project has no match.
    pub(in crate::scaleway) async fn resolve_image_id_with<FutA, FutB, FetchA, FetchB>(
        &self,
        spec: &ResourceSpec,
        project_fetch: FetchA,
        public_fetch: FetchB,
    ) -> Result<String, ScalewayBackendError>
    where
        FetchA: FnOnce() -> FutA,
        FetchB: FnOnce() -> FutB,
        FutA: Future<Output = Result<Vec<ScalewayImage>, ScalewayBackendError>>,
        FutB: Future<Output = Result<Vec<ScalewayImage>, ScalewayBackendError>>,
    {
        let project_images = Self::filter_images(project_fetch().await?, spec);
        let candidates = if project_images.is_empty() {
            Self::filter_images(public_fetch().await?, spec)
        } else {
            project_images
        };

        Self::select_image_id(candidates, spec)
    }

    /// Picks the newest candidate.
    pub(in crate::scaleway) fn select_image_id(
        candidates: Vec<ScalewayImage>,
        spec: &ResourceSpec,
    ) -> Result<String, ScalewayBackendError> {
        candidates
            .into_iter()
            .max_by(|lhs, rhs| lhs.creation_date.cmp(&rhs.creation_date))
            .map(|image| image.id)
            .ok_or_else(|| ScalewayBackendError::ImageNotFound {
                label: spec.image_label.clone(),
                arch: spec.architecture.clone(),
                zone: spec.zone.clone(),
            })
    }

    pub(in crate::scaleway) fn filter_images(
        images: Vec<ScalewayImage>,
        spec: &ResourceSpec,
    ) -> Vec<ScalewayImage> {
        images
            .into_iter()
            .filter(|image| image.arch == spec.architecture)
            .filter(|image| image.state == "available")
            .collect()
    }
}
