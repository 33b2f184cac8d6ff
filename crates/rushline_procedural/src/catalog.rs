//! Segment variant catalog.
//!
//! Static description of every segment template: weight, adjacency rules and
//! geometry. Ids are resolved to indices once, so selection never touches
//! strings.

use std::sync::Arc;

use rushline_core::TemplateId;

use crate::config::VariantConfig;
use crate::segment::{LaneSocket, SegmentShape};

/// A resolved variant.
#[derive(Clone, Debug)]
pub struct Variant {
    /// Unique id.
    pub id: String,
    /// Template, `None` if the variant is unusable.
    pub template: Option<TemplateId>,
    /// Selection weight.
    pub weight: f32,
    /// Longest allowed run, at least 1.
    pub max_consecutive: u32,
    /// Other segments required between two occurrences.
    pub min_spacing: u32,
    /// Catalog indices that may not follow this variant.
    pub disallow_next: Vec<usize>,
    /// Instances built at startup.
    pub prewarm: u32,
    /// Geometry.
    pub shape: SegmentShape,
    /// Lane sockets.
    pub lanes: Arc<[LaneSocket]>,
    /// Anything but the default variant.
    pub tunnel_like: bool,
}

impl Variant {
    /// Has a template to spawn from.
    #[inline]
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.template.is_some()
    }
}

/// All variants, in selection order.
#[derive(Clone, Debug, Default)]
pub struct TrackVariantCatalog {
    variants: Vec<Variant>,
    default_index: Option<usize>,
}

impl TrackVariantCatalog {
    /// Resolves configured variants.
    ///
    /// Unknown `disallow_next` ids are dropped with a warning; a variant
    /// without a template is kept but never selected.
    #[must_use]
    pub fn from_config(configs: &[VariantConfig], default_id: &str, global_lanes: &[LaneSocket]) -> Self {
        let find = |id: &str| configs.iter().position(|c| c.id.eq_ignore_ascii_case(id));
        let default_index = find(default_id);
        let global: Arc<[LaneSocket]> = global_lanes.to_vec().into();

        let variants = configs
            .iter()
            .enumerate()
            .map(|(i, c)| {
                if c.template.is_none() {
                    tracing::error!("Variant '{}' has no template; it will never be selected", c.id);
                }
                let disallow_next = c
                    .disallow_next
                    .iter()
                    .filter_map(|id| {
                        let index = find(id);
                        if index.is_none() {
                            tracing::warn!("Variant '{}' disallows unknown id '{}'", c.id, id);
                        }
                        index
                    })
                    .collect();
                let lanes = match &c.shape.lanes {
                    Some(lanes) if !lanes.is_empty() => lanes.clone().into(),
                    _ => Arc::clone(&global),
                };
                Variant {
                    id: c.id.clone(),
                    template: c.template.as_deref().map(TemplateId::from_name),
                    weight: c.weight,
                    max_consecutive: c.max_consecutive.max(1),
                    min_spacing: c.min_spacing,
                    disallow_next,
                    prewarm: c.prewarm,
                    shape: c.shape.clone(),
                    lanes,
                    // without a default variant nothing is gated
                    tunnel_like: default_index.is_some_and(|d| d != i),
                }
            })
            .collect();

        Self {
            variants,
            default_index,
        }
    }

    /// Number of variants.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Returns `true` if there are no variants.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Variant at `index`.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Variant> {
        self.variants.get(index)
    }

    /// All variants.
    #[inline]
    #[must_use]
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Index of the variant with `id` (case-insensitive).
    #[must_use]
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.variants.iter().position(|v| v.id.eq_ignore_ascii_case(id))
    }

    /// Index of the default variant.
    #[inline]
    #[must_use]
    pub const fn default_index(&self) -> Option<usize> {
        self.default_index
    }

    /// Does any variant have a template?
    #[must_use]
    pub fn has_usable(&self) -> bool {
        self.variants.iter().any(Variant::is_usable)
    }
}
