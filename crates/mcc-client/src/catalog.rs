//! Geo-target and language constant catalog.
//!
//! Resolves human-readable location and language names to Google's numeric
//! constant IDs. A built-in table covers the common markets; entries from
//! Google's published constant catalog can be layered on top from a TOML
//! file:
//!
//! ```toml
//! [[locations]]
//! id = 1012873
//! name = "Riyadh"
//! aliases = ["الرياض"]
//!
//! [[languages]]
//! id = 1064
//! name = "Persian"
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{McError, Result};

/// (geo target constant ID, name, aliases)
const BUILTIN_LOCATIONS: &[(u64, &str, &[&str])] = &[
    (2682, "Saudi Arabia", &["sa", "ksa", "السعودية", "المملكة العربية السعودية"]),
    (2784, "United Arab Emirates", &["ae", "uae", "الإمارات"]),
    (2818, "Egypt", &["eg", "مصر"]),
    (2414, "Kuwait", &["kw", "الكويت"]),
    (2634, "Qatar", &["qa", "قطر"]),
    (2048, "Bahrain", &["bh", "البحرين"]),
    (2512, "Oman", &["om", "عمان"]),
    (2400, "Jordan", &["jo", "الأردن"]),
    (2422, "Lebanon", &["lb", "لبنان"]),
    (2368, "Iraq", &["iq", "العراق"]),
    (2504, "Morocco", &["ma", "المغرب"]),
    (2012, "Algeria", &["dz", "الجزائر"]),
    (2788, "Tunisia", &["tn", "تونس"]),
    (2434, "Libya", &["ly", "ليبيا"]),
    (2729, "Sudan", &["sd", "السودان"]),
    (2887, "Yemen", &["ye", "اليمن"]),
    (2275, "Palestine", &["ps", "فلسطين"]),
    (2792, "Turkey", &["tr", "turkiye", "تركيا"]),
    (2840, "United States", &["us", "usa", "united states of america"]),
    (2826, "United Kingdom", &["gb", "uk", "great britain"]),
    (2124, "Canada", &["ca"]),
    (2036, "Australia", &["au"]),
    (2554, "New Zealand", &["nz"]),
    (2372, "Ireland", &["ie"]),
    (2276, "Germany", &["de"]),
    (2250, "France", &["fr"]),
    (2724, "Spain", &["es"]),
    (2380, "Italy", &["it"]),
    (2528, "Netherlands", &["nl"]),
    (2056, "Belgium", &["be"]),
    (2756, "Switzerland", &["ch"]),
    (2040, "Austria", &["at"]),
    (2752, "Sweden", &["se"]),
    (2578, "Norway", &["no"]),
    (2208, "Denmark", &["dk"]),
    (2616, "Poland", &["pl"]),
    (2620, "Portugal", &["pt"]),
    (2356, "India", &["in"]),
    (2586, "Pakistan", &["pk"]),
    (2360, "Indonesia", &["id"]),
    (2458, "Malaysia", &["my"]),
    (2702, "Singapore", &["sg"]),
    (2392, "Japan", &["jp"]),
    (2410, "South Korea", &["kr", "korea"]),
    (2076, "Brazil", &["br"]),
    (2484, "Mexico", &["mx"]),
    (2710, "South Africa", &["za"]),
    (2566, "Nigeria", &["ng"]),
];

/// (language constant ID, name, aliases)
const BUILTIN_LANGUAGES: &[(u64, &str, &[&str])] = &[
    (1019, "Arabic", &["ar", "العربية"]),
    (1000, "English", &["en", "الإنجليزية"]),
    (1002, "French", &["fr", "الفرنسية"]),
    (1001, "German", &["de"]),
    (1003, "Spanish", &["es"]),
    (1004, "Italian", &["it"]),
    (1014, "Portuguese", &["pt"]),
    (1010, "Dutch", &["nl"]),
    (1037, "Turkish", &["tr"]),
    (1031, "Russian", &["ru"]),
    (1064, "Persian", &["fa", "farsi"]),
    (1041, "Urdu", &["ur"]),
    (1023, "Hindi", &["hi"]),
    (1056, "Bengali", &["bn"]),
    (1025, "Indonesian", &["id"]),
    (1102, "Malay", &["ms"]),
    (1005, "Japanese", &["ja"]),
    (1012, "Korean", &["ko"]),
    (1017, "Chinese (Simplified)", &["zh", "zh-cn", "chinese"]),
    (1018, "Chinese (Traditional)", &["zh-tw"]),
    (1027, "Hebrew", &["he", "iw"]),
    (1030, "Polish", &["pl"]),
    (1015, "Swedish", &["sv"]),
    (1044, "Thai", &["th"]),
];

/// One catalog entry as stored in the override file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    locations: Vec<CatalogEntry>,
    #[serde(default)]
    languages: Vec<CatalogEntry>,
}

/// Outcome of resolving a list of names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Resolved constant IDs, deduplicated in first-seen order
    pub ids: Vec<u64>,
    /// Names that matched nothing
    pub unresolved: Vec<String>,
}

#[derive(Debug, Clone)]
struct Table {
    kind: &'static str,
    resource_prefix: &'static str,
    by_key: HashMap<String, u64>,
}

impl Table {
    fn new(kind: &'static str, resource_prefix: &'static str) -> Self {
        Self {
            kind,
            resource_prefix,
            by_key: HashMap::new(),
        }
    }

    fn insert(&mut self, entry: &CatalogEntry) {
        self.by_key.insert(normalize_key(&entry.name), entry.id);
        for alias in &entry.aliases {
            self.by_key.insert(normalize_key(alias), entry.id);
        }
    }

    fn lookup(&self, name: &str) -> Option<u64> {
        let trimmed = name.trim();

        // Raw IDs and constant resource names pass through untouched
        if let Ok(id) = trimmed.parse::<u64>() {
            return Some(id);
        }
        if let Some(id) = trimmed
            .strip_prefix(self.resource_prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .and_then(|rest| rest.parse::<u64>().ok())
        {
            return Some(id);
        }

        self.by_key.get(&normalize_key(trimmed)).copied()
    }

    fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Resolution {
        let mut resolution = Resolution::default();

        for name in names {
            let name = name.as_ref();
            if name.trim().is_empty() {
                continue;
            }
            match self.lookup(name) {
                Some(id) => {
                    if !resolution.ids.contains(&id) {
                        resolution.ids.push(id);
                    }
                }
                None => {
                    tracing::warn!("Unknown {} '{}' dropped from targeting", self.kind, name);
                    resolution.unresolved.push(name.to_string());
                }
            }
        }

        resolution
    }
}

fn normalize_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn builtin_entries<'a>(
    rows: &'a [(u64, &'a str, &'a [&'a str])],
) -> impl Iterator<Item = CatalogEntry> + 'a {
    rows.iter().map(|(id, name, aliases)| CatalogEntry {
        id: *id,
        name: (*name).to_string(),
        aliases: aliases.iter().map(|a| (*a).to_string()).collect(),
    })
}

/// Name to constant-ID lookup for locations and languages.
#[derive(Debug, Clone)]
pub struct Catalog {
    locations: Table,
    languages: Table,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog {
    /// Catalog holding only the built-in tables.
    pub fn builtin() -> Self {
        let mut catalog = Self {
            locations: Table::new("location", "geoTargetConstants"),
            languages: Table::new("language", "languageConstants"),
        };
        for entry in builtin_entries(BUILTIN_LOCATIONS) {
            catalog.locations.insert(&entry);
        }
        for entry in builtin_entries(BUILTIN_LANGUAGES) {
            catalog.languages.insert(&entry);
        }
        catalog
    }

    /// Built-in tables extended (and overridden on name clashes) by a TOML
    /// catalog file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| McError::Catalog(format!("{}: {}", path.display(), e)))?;
        let file: CatalogFile = toml::from_str(&content)
            .map_err(|e| McError::Catalog(format!("{}: {}", path.display(), e)))?;

        let mut catalog = Self::builtin();
        catalog.extend(&file.locations, &file.languages);

        tracing::info!(
            "Loaded ads catalog from {} ({} locations, {} languages)",
            path.display(),
            file.locations.len(),
            file.languages.len()
        );

        Ok(catalog)
    }

    pub fn extend(&mut self, locations: &[CatalogEntry], languages: &[CatalogEntry]) {
        for entry in locations {
            self.locations.insert(entry);
        }
        for entry in languages {
            self.languages.insert(entry);
        }
    }

    pub fn resolve_locations<S: AsRef<str>>(&self, names: &[S]) -> Resolution {
        self.locations.resolve(names)
    }

    pub fn resolve_languages<S: AsRef<str>>(&self, names: &[S]) -> Resolution {
        self.languages.resolve(names)
    }
}
