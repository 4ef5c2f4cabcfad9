// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The seam between the engine and the server.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::types::Mutation;
use crate::error::ApplyError;

/// Sends one mutation to the server.
///
/// Implementations own their transport timeouts. Any `Err` counts as a
/// failed attempt.
#[async_trait]
pub trait MutationApplier: Send + Sync + 'static {
    async fn apply(&self, mutation: &Mutation) -> Result<(), ApplyError>;
}

#[async_trait]
impl<T: MutationApplier + ?Sized> MutationApplier for Arc<T> {
    async fn apply(&self, mutation: &Mutation) -> Result<(), ApplyError> {
        (**self).apply(mutation).await
    }
}

/// Dispatches mutations to per-resource appliers.
///
/// ```
/// use offline_sync::coordinator::{Mutation, MutationApplier, ResourceRouter};
/// use offline_sync::ApplyError;
/// use async_trait::async_trait;
///
/// struct Profiles;
///
/// #[async_trait]
/// impl MutationApplier for Profiles {
///     async fn apply(&self, _m: &Mutation) -> Result<(), ApplyError> {
///         Ok(())
///     }
/// }
///
/// let router = ResourceRouter::new().route("profile", Profiles);
/// assert!(router.handles("profile"));
/// assert!(!router.handles("posts"));
/// ```
#[derive(Default, Clone)]
pub struct ResourceRouter {
    routes: HashMap<String, Arc<dyn MutationApplier>>,
}

impl ResourceRouter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn route(mut self, resource: impl Into<String>, applier: impl MutationApplier) -> Self {
        self.routes.insert(resource.into(), Arc::new(applier));
        self
    }

    #[must_use]
    pub fn handles(&self, resource: &str) -> bool {
        self.routes.contains_key(resource)
    }
}

#[async_trait]
impl MutationApplier for ResourceRouter {
    async fn apply(&self, mutation: &Mutation) -> Result<(), ApplyError> {
        match self.routes.get(&mutation.resource) {
            Some(applier) => applier.apply(mutation).await,
            None => Err(ApplyError::UnknownResource(mutation.resource.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::SyncAction;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl MutationApplier for Counting {
        async fn apply(&self, _m: &Mutation) -> Result<(), ApplyError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn mutation(resource: &str) -> Mutation {
        Mutation {
            action: SyncAction::Create,
            resource: resource.into(),
            payload: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn test_router_dispatches_by_resource() {
        let profiles = Arc::new(AtomicUsize::new(0));
        let posts = Arc::new(AtomicUsize::new(0));
        let router = ResourceRouter::new()
            .route("profile", Counting(profiles.clone()))
            .route("post", Counting(posts.clone()));

        router.apply(&mutation("profile")).await.unwrap();
        router.apply(&mutation("post")).await.unwrap();
        router.apply(&mutation("post")).await.unwrap();

        assert_eq!(profiles.load(Ordering::SeqCst), 1);
        assert_eq!(posts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_router_unknown_resource_fails() {
        let router = ResourceRouter::new();
        assert_eq!(
            router.apply(&mutation("ghost")).await,
            Err(ApplyError::UnknownResource("ghost".into()))
        );
    }
}
