//! Scoped use of compute requirement templates.
//!
//! A caller either supplies an existing template, which is never touched, or
//! a definition that is created for the scope and deleted when it ends.
//! [`use_template`] releases explicitly on every return path; the lease's
//! `Drop` covers panics and cancelled futures by scheduling the delete on
//! the current tokio runtime.

use std::future::Future;

use thiserror::Error;
use tracing::{info, warn};

use crate::platform::{ComputeRequirementTemplate, TemplateId, TemplateStore};

/// Where the template for a scope comes from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TemplateSource {
    /// A template owned by the caller; reused as-is.
    Existing(TemplateId),
    /// A definition to create for the scope and delete afterwards.
    Create(ComputeRequirementTemplate),
}

impl TemplateSource {
    /// Picks the caller's template when given; the definition is then unused.
    #[must_use]
    pub fn from_parts(
        template_id: Option<TemplateId>,
        definition: ComputeRequirementTemplate,
    ) -> Self {
        template_id.map_or(Self::Create(definition), Self::Existing)
    }
}

/// Errors raised while acquiring or releasing a template.
#[derive(Debug, Error)]
pub enum TemplateError<E>
where
    E: std::error::Error + 'static,
{
    /// The platform rejected the template definition.
    #[error("failed to create compute requirement template: {0}")]
    Create(#[source] E),
    /// The created template could not be deleted.
    #[error("failed to delete compute requirement template {id}: {source}")]
    Delete {
        /// Template left behind.
        id: TemplateId,
        /// Provider-specific error.
        #[source]
        source: E,
    },
}

/// Errors raised by [`use_template`].
#[derive(Debug, Error)]
pub enum ScopedError<E, B>
where
    E: std::error::Error + 'static,
    B: std::error::Error + 'static,
{
    /// Acquisition or release failed.
    #[error(transparent)]
    Lease(#[from] TemplateError<E>),
    /// The scoped body failed; any release failure is noted in the message.
    #[error("{message}")]
    Body {
        /// Body error plus a teardown note when release also failed.
        message: String,
        /// The body's error.
        #[source]
        source: B,
    },
}

/// A template held for the duration of a scope.
#[derive(Debug)]
pub struct TemplateLease<S>
where
    S: TemplateStore + Clone + Send + Sync + 'static,
{
    id: TemplateId,
    owner: Option<S>,
}

impl<S> TemplateLease<S>
where
    S: TemplateStore + Clone + Send + Sync + 'static,
{
    /// Acquires a template, creating it when the source is a definition.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Create`] when the platform rejects the
    /// definition.
    pub async fn acquire(store: &S, source: TemplateSource) -> Result<Self, TemplateError<S::Error>> {
        match source {
            TemplateSource::Existing(id) => {
                info!(template_id = %id, "using caller-supplied template");
                Ok(Self { id, owner: None })
            }
            TemplateSource::Create(definition) => {
                let id = store
                    .create_template(&definition)
                    .await
                    .map_err(TemplateError::Create)?;
                info!(template_id = %id, name = %definition.name, "created template");
                Ok(Self {
                    id,
                    owner: Some(store.clone()),
                })
            }
        }
    }

    /// Identifier of the leased template.
    #[must_use]
    pub const fn id(&self) -> &TemplateId {
        &self.id
    }

    /// Returns `true` when the lease created the template and will delete it.
    #[must_use]
    pub const fn is_owned(&self) -> bool {
        self.owner.is_some()
    }

    /// Deletes the template if the lease created it.
    ///
    /// The lease keeps ownership until the delete resolves, so cancelling
    /// this future hands the delete to the `Drop` fallback.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Delete`] when the platform refuses the delete.
    pub async fn release(mut self) -> Result<(), TemplateError<S::Error>> {
        let Some(store) = self.owner.clone() else {
            return Ok(());
        };
        let deleted = store.delete_template(&self.id).await;
        self.owner = None;
        match deleted {
            Ok(()) => {
                info!(template_id = %self.id, "deleted template");
                Ok(())
            }
            Err(source) => Err(TemplateError::Delete {
                id: self.id.clone(),
                source,
            }),
        }
    }
}

impl<S> Drop for TemplateLease<S>
where
    S: TemplateStore + Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        let Some(store) = self.owner.take() else {
            return;
        };
        let id = self.id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(template_id = %id, "template lease dropped unreleased; deleting in background");
                drop(handle.spawn(async move {
                    if let Err(err) = store.delete_template(&id).await {
                        warn!(template_id = %id, error = %err, "background template delete failed");
                    }
                }));
            }
            Err(_) => {
                warn!(template_id = %id, "template lease dropped outside a runtime; template leaked");
            }
        }
    }
}

/// Runs `body` with a leased template and always releases it.
///
/// A release failure after a successful body is returned as the error. A
/// release failure after a failed body is logged and noted in the body's
/// error message, never replacing it.
///
/// # Errors
///
/// Returns [`ScopedError::Lease`] when acquisition fails (the body does not
/// run) or when release fails after success, and [`ScopedError::Body`] when
/// the body fails.
pub async fn use_template<S, F, Fut, T, B>(
    store: &S,
    source: TemplateSource,
    body: F,
) -> Result<T, ScopedError<S::Error, B>>
where
    S: TemplateStore + Clone + Send + Sync + 'static,
    F: FnOnce(TemplateId) -> Fut,
    Fut: Future<Output = Result<T, B>>,
    B: std::error::Error + 'static,
{
    let lease = TemplateLease::acquire(store, source).await?;
    let outcome = body(lease.id().clone()).await;
    let released = lease.release().await;

    match (outcome, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(release_err)) => Err(ScopedError::Lease(release_err)),
        (Err(source), Ok(())) => Err(ScopedError::Body {
            message: source.to_string(),
            source,
        }),
        (Err(source), Err(release_err)) => {
            warn!(error = %release_err, "template release failed after scoped body failed");
            Err(ScopedError::Body {
                message: append_teardown_note(source.to_string(), Some(&release_err)),
                source,
            })
        }
    }
}

/// Appends a teardown failure to a primary error message.
pub(crate) fn append_teardown_note<E: std::fmt::Display>(
    message: String,
    teardown_error: Option<&E>,
) -> String {
    if let Some(teardown) = teardown_error {
        format!("{message} (teardown also failed: {teardown})")
    } else {
        message
    }
}
