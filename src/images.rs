//! Machine image family resolution.

use thiserror::Error;

use crate::platform::{ImageCatalog, ImageFamilyId, ImageFamilySearch, MachineImageFamily};

/// Namespace holding the platform's published image families.
pub const PUBLIC_IMAGE_NAMESPACE: &str = "YellowDog";

/// Errors raised while resolving an image family.
#[derive(Debug, Error)]
pub enum ImageFamilyError<E>
where
    E: std::error::Error + 'static,
{
    /// No visible family carries the requested name.
    #[error("unable to find ID for image family: {name}")]
    NotFound {
        /// Requested family name.
        name: String,
    },
    /// Several visible families carry the requested name.
    #[error("multiple image families named {name} found ({count})")]
    Ambiguous {
        /// Requested family name.
        name: String,
        /// Number of families sharing the name.
        count: usize,
    },
    /// The search itself failed.
    #[error("image family search failed: {0}")]
    Search(#[source] E),
}

impl ImageFamilySearch {
    /// Searches public families and the platform namespace for `family_name`.
    #[must_use]
    pub fn public(family_name: impl Into<String>) -> Self {
        Self {
            include_public: true,
            namespace: Some(PUBLIC_IMAGE_NAMESPACE.to_owned()),
            family_name: family_name.into(),
        }
    }
}

/// Resolves `family_name` to the identifier of the one family bearing it.
///
/// # Errors
///
/// Returns [`ImageFamilyError::NotFound`] or [`ImageFamilyError::Ambiguous`]
/// when the exact-name matches are not exactly one, and
/// [`ImageFamilyError::Search`] when the catalog query fails.
pub async fn resolve_image_family<C>(
    catalog: &C,
    family_name: &str,
) -> Result<ImageFamilyId, ImageFamilyError<C::Error>>
where
    C: ImageCatalog + ?Sized,
{
    let search = ImageFamilySearch::public(family_name);
    let families = catalog
        .search_image_families(&search)
        .await
        .map_err(ImageFamilyError::Search)?;
    select_family(families, family_name)
}

/// Keeps the exact, case-sensitive name matches and requires exactly one.
///
/// # Errors
///
/// Returns [`ImageFamilyError::NotFound`] for zero matches and
/// [`ImageFamilyError::Ambiguous`] for more than one.
pub fn select_family<E>(
    families: Vec<MachineImageFamily>,
    family_name: &str,
) -> Result<ImageFamilyId, ImageFamilyError<E>>
where
    E: std::error::Error + 'static,
{
    let mut matches: Vec<MachineImageFamily> = families
        .into_iter()
        .filter(|family| family.name == family_name)
        .collect();

    match matches.len() {
        0 => Err(ImageFamilyError::NotFound {
            name: family_name.to_owned(),
        }),
        1 => matches.pop().map(|family| family.id).ok_or_else(|| {
            ImageFamilyError::NotFound {
                name: family_name.to_owned(),
            }
        }),
        count => Err(ImageFamilyError::Ambiguous {
            name: family_name.to_owned(),
            count,
        }),
    }
}
