//! Ticket whitelist and classification.
//!
//! Tickets are matched on pairings of event and product IDs, grouped into
//! categories. Each category owns one or more (eventId, productId) pairs
//! signed by a recognized issuer key; classifying a user's ticket into a
//! category is what decides whether a proof grants access. Matching is
//! exact: event ID, product ID, and structural public-key equality, in
//! declaration order, first hit wins.

use std::{collections::BTreeSet, fs, path::Path};

use serde::{Deserialize, Serialize};
use uuid::{uuid, Uuid};
use zugate_pcd::EdDsaPublicKey;

/// The fixed set of recognized ticket categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketCategory {
    ZuzaluResident,
    ZuzaluOrganizer,
    ZuzaluVisitor,
    ZuConnectResident,
}

/// One recognized (event, product, signer) triple.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketSpec {
    pub event_id: Uuid,
    pub product_id: Uuid,
    pub public_key: EdDsaPublicKey,
}

/// Config-file entry for a registry loaded from JSON. `publicKey` may be
/// omitted per entry, in which case the process-wide signer key applies.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TicketSpecEntry {
    category: TicketCategory,
    event_id: Uuid,
    product_id: Uuid,
    #[serde(default)]
    public_key: Option<EdDsaPublicKey>,
}

const ZUZALU_EVENT: Uuid = uuid!("5de90d09-22db-40ca-b3ae-d934573def8b");

/// Immutable, process-wide ticket whitelist.
#[derive(Clone, Debug)]
pub struct TicketRegistry {
    categories: Vec<(TicketCategory, Vec<TicketSpec>)>,
}

impl TicketRegistry {
    /// Build a registry from categories in declaration order.
    ///
    /// Panics on a duplicate category or an empty spec list; both are
    /// configuration mistakes that must fail startup.
    pub fn from_categories(categories: Vec<(TicketCategory, Vec<TicketSpec>)>) -> Self {
        for (idx, (category, specs)) in categories.iter().enumerate() {
            if specs.is_empty() {
                panic!("ticket category {category:?} has no specs");
            }
            if categories[..idx].iter().any(|(seen, _)| seen == category) {
                panic!("duplicate ticket category {category:?} in registry");
            }
        }
        Self { categories }
    }

    /// The built-in Zuzalu/ZuConnect whitelist, with every spec bound to
    /// the given issuer key.
    pub fn zuzalu(signer: &EdDsaPublicKey) -> Self {
        let spec = |event_id: Uuid, product_id: Uuid| TicketSpec {
            event_id,
            product_id,
            public_key: signer.clone(),
        };

        Self::from_categories(vec![
            (
                TicketCategory::ZuzaluResident,
                vec![spec(ZUZALU_EVENT, uuid!("5ba4cd9e-893c-4a4a-b15b-cf36ceda1938"))],
            ),
            (
                TicketCategory::ZuzaluOrganizer,
                vec![spec(ZUZALU_EVENT, uuid!("10016d35-40df-4033-a171-7d661ebaccaa"))],
            ),
            (
                TicketCategory::ZuzaluVisitor,
                vec![spec(ZUZALU_EVENT, uuid!("53b518ed-e427-4a23-bf36-a6e1e2764256"))],
            ),
            (
                TicketCategory::ZuConnectResident,
                vec![
                    spec(
                        uuid!("91312aa1-5f74-4264-bdeb-f4a3ddb8670c"),
                        uuid!("cc9e3650-c29b-4629-b275-6b34fc70b2f9"),
                    ),
                    spec(
                        uuid!("54863995-10c4-46e4-9342-75e48b68d307"),
                        uuid!("d2123bf9-c027-4851-b52c-d8b73fc3f5af"),
                    ),
                    spec(
                        uuid!("797de414-2aec-4ef8-8655-09df7e2b6cc6"),
                        uuid!("d3620f38-56a9-4235-bea8-0d1dba6bb623"),
                    ),
                    spec(
                        uuid!("a6109324-7ca0-4198-9583-77962d1b9d53"),
                        uuid!("a6109324-7ca0-4198-9583-77962d1b9d53"),
                    ),
                ],
            ),
        ])
    }

    /// Load a registry from a JSON config file: an array of
    /// `{category, eventId, productId, publicKey?}` entries, grouped into
    /// categories in first-seen order.
    pub fn from_path(path: impl AsRef<Path>, default_signer: &EdDsaPublicKey) -> Self {
        let path_ref = path.as_ref();
        let bytes = fs::read(path_ref).unwrap_or_else(|err| {
            panic!(
                "failed to read ticket configuration from {}: {}",
                path_ref.display(),
                err
            )
        });
        let entries: Vec<TicketSpecEntry> = serde_json::from_slice(&bytes).unwrap_or_else(|err| {
            panic!(
                "failed to parse ticket configuration from {}: {}",
                path_ref.display(),
                err
            )
        });

        let mut categories: Vec<(TicketCategory, Vec<TicketSpec>)> = Vec::new();
        for entry in entries {
            let spec = TicketSpec {
                event_id: entry.event_id,
                product_id: entry.product_id,
                public_key: entry
                    .public_key
                    .unwrap_or_else(|| default_signer.clone()),
            };
            match categories
                .iter_mut()
                .find(|(category, _)| *category == entry.category)
            {
                Some((_, specs)) => specs.push(spec),
                None => categories.push((entry.category, vec![spec])),
            }
        }

        Self::from_categories(categories)
    }

    /// Map a ticket's (event, product, signer) triple to its category, if
    /// any. Deterministic and side-effect free.
    pub fn classify(
        &self,
        event_id: &Uuid,
        product_id: &Uuid,
        signer: &EdDsaPublicKey,
    ) -> Option<TicketCategory> {
        for (category, specs) in &self.categories {
            for spec in specs {
                if spec.event_id == *event_id
                    && spec.product_id == *product_id
                    && spec.public_key == *signer
                {
                    return Some(*category);
                }
            }
        }
        None
    }

    /// Union of all event IDs across categories, for collaborators that
    /// need an event allowlist.
    pub fn supported_events(&self) -> BTreeSet<Uuid> {
        self.categories
            .iter()
            .flat_map(|(_, specs)| specs.iter().map(|spec| spec.event_id))
            .collect()
    }
}
