//! Built-in city table used when geocoding is unavailable.

use crate::types::Location;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct City {
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

impl City {
    const fn new(name: &'static str, latitude: f64, longitude: f64) -> Self {
        Self {
            name,
            latitude,
            longitude,
        }
    }

    pub fn to_location(&self) -> Location {
        Location::new(self.latitude, self.longitude, self.name)
    }
}

/// Brazilian capitals and large cities. The first five double as the default locations.
pub const CITIES: [City; 29] = [
    City::new("São Paulo", -23.5505, -46.6333),
    City::new("Rio de Janeiro", -22.9068, -43.1729),
    City::new("Brasília", -15.7942, -47.8822),
    City::new("Salvador", -12.9714, -38.5011),
    City::new("Fortaleza", -3.7319, -38.5267),
    City::new("Belo Horizonte", -19.9167, -43.9345),
    City::new("Manaus", -3.1190, -60.0217),
    City::new("Curitiba", -25.4289, -49.2671),
    City::new("Recife", -8.0476, -34.8770),
    City::new("Porto Alegre", -30.0346, -51.2177),
    City::new("Belém", -1.4554, -48.4898),
    City::new("Goiânia", -16.6864, -49.2653),
    City::new("Guarulhos", -23.4543, -46.5339),
    City::new("Campinas", -22.9064, -47.0616),
    City::new("Natal", -5.7945, -35.2090),
    City::new("Maceió", -9.6498, -35.7089),
    City::new("João Pessoa", -7.1150, -34.8631),
    City::new("Teresina", -5.0892, -42.8016),
    City::new("São Luís", -2.5297, -44.3028),
    City::new("Campo Grande", -20.4486, -54.6295),
    City::new("Cuiabá", -15.6010, -56.0974),
    City::new("Aracaju", -10.9091, -37.0677),
    City::new("Vitória", -20.2976, -40.2958),
    City::new("Florianópolis", -27.5969, -48.5495),
    City::new("Palmas", -10.1753, -48.2982),
    City::new("Boa Vista", 2.8235, -60.6758),
    City::new("Porto Velho", -8.7619, -63.9039),
    City::new("Rio Branco", -9.9754, -67.8249),
    City::new("Macapá", 0.0349, -51.0504),
];

const DEFAULT_LOCATION_COUNT: usize = 5;

pub fn default_locations() -> Vec<Location> {
    CITIES[..DEFAULT_LOCATION_COUNT]
        .iter()
        .map(City::to_location)
        .collect()
}

/// Find a city by name.
///
/// Rules are tried in order and the first one with any match wins:
/// exact (case-insensitive), containment either way, prefix either way.
pub fn lookup(query: &str) -> Option<&'static City> {
    let term = query.trim().to_lowercase();
    if term.is_empty() {
        return None;
    }

    let rules: [fn(&str, &str) -> bool; 3] = [
        |name, term| name == term,
        |name, term| name.contains(term) || term.contains(name),
        |name, term| name.starts_with(term) || term.starts_with(name),
    ];

    rules.iter().find_map(|rule| {
        CITIES
            .iter()
            .find(|city| rule(&city.name.to_lowercase(), &term))
    })
}
