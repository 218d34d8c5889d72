//! Deterministic stand-ins for the data layer.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::time::Duration;

use laguna_coords::GeoPoint;
use laguna_loader::{Entity, EntityDetails, EntityKind, EntitySource, SourceError};
use laguna_scene::{Color, EntityId};
use laguna_world::{GeoPolygon, OwnerStyle, OwnerTable};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const FAMILIES: [&str; 6] = ["Contarini", "Morosini", "Dandolo", "Grimani", "Mocenigo", "Venier"];

/// Parcel edge length in degrees.
const PARCEL_DEG: f64 = 0.0004;

pub fn owner_table() -> OwnerTable {
    let mut owners = OwnerTable::new();
    for (i, family) in FAMILIES.iter().enumerate() {
        let hue = i as f32 / FAMILIES.len() as f32 * 360.0;
        owners.insert(
            *family,
            OwnerStyle {
                color: Color::from_hsl(hue, 0.55, 0.45),
                coat_of_arms: Some(format!("arms/{}.png", family.to_lowercase())),
            },
        );
    }
    owners
}

/// A square grid of jittered quads around `center`. Roughly one parcel in
/// fifteen has a truncated ring and renders as a marker.
pub fn parcels(rng: &mut ChaCha8Rng, center: GeoPoint, count: usize) -> Vec<GeoPolygon> {
    let side = (count as f64).sqrt().ceil().max(1.0) as usize;
    let origin = GeoPoint::new(
        center.lat - side as f64 * PARCEL_DEG * 0.5,
        center.lng - side as f64 * PARCEL_DEG * 0.5,
    );
    (0..count)
        .map(|i| {
            let (row, col) = ((i / side) as f64, (i % side) as f64);
            let lat = origin.lat + row * PARCEL_DEG;
            let lng = origin.lng + col * PARCEL_DEG;
            let mut jitter = || rng.random_range(-0.05..0.05) * PARCEL_DEG;
            let inset = PARCEL_DEG * 0.9;
            let mut vertices = vec![
                GeoPoint::new(lat + jitter(), lng + jitter()),
                GeoPoint::new(lat + jitter(), lng + inset + jitter()),
                GeoPoint::new(lat + inset + jitter(), lng + inset + jitter()),
                GeoPoint::new(lat + inset + jitter(), lng + jitter()),
            ];
            if rng.random_ratio(1, 15) {
                vertices.truncate(2);
            }

            let mut polygon = GeoPolygon::new(format!("parcel-{i:04}"), vertices)
                .with_income(rng.random_range(50.0..5000.0));
            if rng.random_bool(0.8) {
                polygon = polygon.with_owner(FAMILIES[rng.random_range(0..FAMILIES.len())]);
            }
            polygon
        })
        .collect()
}

/// Entities scattered over the parcel area. A few sit outside the valid
/// radius and end up as placeholders.
pub fn entities(rng: &mut ChaCha8Rng, center: GeoPoint, count: usize) -> Vec<Entity> {
    let spread = PARCEL_DEG * (count as f64).sqrt().max(1.0);
    (0..count)
        .map(|i| {
            let kind = match rng.random_range(0..10) {
                0..=5 => EntityKind::Building,
                6 => EntityKind::Bridge,
                7 => EntityKind::Dock,
                _ => EntityKind::Citizen,
            };
            let position = if rng.random_ratio(1, 25) {
                GeoPoint::new(center.lat + 5.0, center.lng)
            } else {
                GeoPoint::new(
                    center.lat + rng.random_range(-spread..spread),
                    center.lng + rng.random_range(-spread..spread),
                )
            };
            let mut entity = Entity::new(format!("{}-{i:04}", kind.name()), kind, position);
            entity.rotation = rng.random_range(0.0..std::f32::consts::TAU);
            if kind == EntityKind::Building && rng.random_bool(0.3) {
                entity = entity.with_type("market-stall", Some("covered"));
            }
            entity
        })
        .collect()
}

/// Paginated source with latency and random failures.
pub struct FlakySource {
    entities: RefCell<Vec<Entity>>,
    rng: RefCell<ChaCha8Rng>,
    failure_rate: f64,
    latency: Duration,
    failures: Cell<usize>,
}

impl FlakySource {
    pub fn new(entities: Vec<Entity>, seed: u64, failure_rate: f64, latency: Duration) -> Self {
        Self {
            entities: RefCell::new(entities),
            rng: RefCell::new(ChaCha8Rng::seed_from_u64(seed)),
            failure_rate: failure_rate.clamp(0.0, 1.0),
            latency,
            failures: Cell::new(0),
        }
    }

    /// Drop the last `n` entities, as if they were demolished upstream.
    pub fn remove_tail(&self, n: usize) {
        let mut entities = self.entities.borrow_mut();
        let keep = entities.len().saturating_sub(n);
        entities.truncate(keep);
    }

    /// Injected failures so far.
    pub fn failures(&self) -> usize {
        self.failures.get()
    }

    fn roll_failure(&self) -> bool {
        let fail = self.rng.borrow_mut().random_bool(self.failure_rate);
        if fail {
            self.failures.set(self.failures.get() + 1);
        }
        fail
    }
}

impl EntitySource for &FlakySource {
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<Entity>, SourceError> {
        tokio::time::sleep(self.latency).await;
        if self.roll_failure() {
            return Err(SourceError::Unavailable(format!("page at offset {offset}")));
        }
        let entities = self.entities.borrow();
        Ok(entities.iter().skip(offset).take(limit).cloned().collect())
    }

    async fn fetch_details(&self, id: &EntityId) -> Result<EntityDetails, SourceError> {
        tokio::time::sleep(self.latency).await;
        let entities = self.entities.borrow();
        let entity = entities
            .iter()
            .find(|e| &e.id == id)
            .ok_or_else(|| SourceError::NotFound(id.clone()))?;
        let mut attributes = BTreeMap::new();
        attributes.insert("kind".to_string(), entity.kind.name().to_string());
        if let Some(owner) = &entity.owner {
            attributes.insert("owner".to_string(), owner.clone());
        }
        Ok(EntityDetails {
            name: format!("{} {}", entity.asset_type(), id),
            description: None,
            attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laguna_coords::{CoordinateTransform, SceneBounds};

    const CENTER: GeoPoint = GeoPoint::new(45.4371, 12.3358);

    #[test]
    fn test_same_seed_same_data() {
        let a = parcels(&mut ChaCha8Rng::seed_from_u64(3), CENTER, 40);
        let b = parcels(&mut ChaCha8Rng::seed_from_u64(3), CENTER, 40);
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
    }

    #[test]
    fn test_parcels_stay_in_range() {
        let transform = CoordinateTransform::new(SceneBounds::default()).unwrap();
        let polys = parcels(&mut ChaCha8Rng::seed_from_u64(9), CENTER, 400);
        for polygon in &polys {
            for vertex in &polygon.vertices {
                assert!(transform.validate(*vertex).is_ok(), "{}", polygon.id);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_pages_and_details() {
        let data = entities(&mut ChaCha8Rng::seed_from_u64(1), CENTER, 30);
        let first = data[0].id.clone();
        let source = FlakySource::new(data, 1, 0.0, Duration::from_millis(10));
        let source = &source;

        assert_eq!(source.fetch_page(20, 20).await.unwrap().len(), 10);
        let details = source.fetch_details(&first).await.unwrap();
        assert!(details.name.ends_with(first.as_str()));

        source.remove_tail(25);
        assert_eq!(source.fetch_page(0, 20).await.unwrap().len(), 5);
        assert!(matches!(
            source.fetch_details(&EntityId::new("nope")).await,
            Err(SourceError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_source() {
        let source = FlakySource::new(Vec::new(), 1, 1.0, Duration::ZERO);
        let source = &source;
        assert!(source.fetch_page(0, 20).await.is_err());
        assert_eq!(source.failures(), 1);
    }
}
