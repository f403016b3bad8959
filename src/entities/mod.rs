// Entity Models - the Country → Region → Location hierarchy plus Disease
//
// Each entity has:
// - A business key (name or composite of names) used before it has an id
// - An optional database identity, assigned by a bulk save
// - A cache that resolves business keys to one shared in-memory instance
//
// Instances are handed out as `Shared<T>` so a Region can point at its
// Country and a DiseaseCase at its Location. One import run is driven by
// one thread, so `Rc<RefCell<_>>` is enough.

use std::cell::RefCell;
use std::rc::Rc;

pub mod country;
pub mod region;
pub mod location;
pub mod disease;

pub use country::{Continent, Country, CountryCache, CountryRef, WhoRegion};
pub use region::{region_key, Region, RegionCache, RegionRef};
pub use location::{location_key, Location, LocationCache, LocationRef};
pub use disease::{Disease, DiseaseCache, DiseaseCase, DiseaseRef};

/// Literal placeholder used by sources for "no finer subdivision"
pub const STANDARD: &str = "standard";

pub type Shared<T> = Rc<RefCell<T>>;

pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

pub(crate) fn is_standard(name: &str) -> bool {
    name.eq_ignore_ascii_case(STANDARD)
}
