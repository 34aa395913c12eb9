//! Transformation profiles.
//!
//! A profile is a named, ordered list of filter operations with a target
//! geometry. Profiles come from configuration and are validated once at
//! load; a [`Profile`] value always has a geometry.

use std::collections::BTreeMap;
use std::fmt;

use assetforged_common::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::config::ProfileConfig;

/// A single filter operation, applied in configuration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    /// Fit inside the box, preserving aspect ratio.
    Scale { width: u32, height: u32 },
    /// Resize to exactly the given dimensions.
    ScaleExact { width: u32, height: u32 },
    /// Resize to the given width, preserving aspect ratio.
    ScaleWidth { width: u32 },
    /// Resize to the given height, preserving aspect ratio.
    ScaleHeight { height: u32 },
    /// Cut out a region.
    Crop {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    Grayscale,
    /// Gaussian blur.
    Blur { sigma: f32 },
}

impl Filter {
    fn validate(&self) -> std::result::Result<(), String> {
        let positive = |what: &str, v: u32| {
            if v == 0 {
                Err(format!("{} {} must be greater than zero", self, what))
            } else {
                Ok(())
            }
        };
        match *self {
            Self::Scale { width, height } | Self::ScaleExact { width, height } => {
                positive("width", width)?;
                positive("height", height)
            }
            Self::ScaleWidth { width } => positive("width", width),
            Self::ScaleHeight { height } => positive("height", height),
            Self::Crop { width, height, .. } => {
                positive("width", width)?;
                positive("height", height)
            }
            Self::Grayscale => Ok(()),
            Self::Blur { sigma } => {
                if sigma.is_finite() && sigma > 0.0 {
                    Ok(())
                } else {
                    Err(format!("blur sigma must be a positive number, got {}", sigma))
                }
            }
        }
    }

    fn geometry(&self) -> Option<Geometry> {
        match *self {
            Self::Scale { width, height } => Some(Geometry::Bounds { width, height }),
            Self::ScaleExact { width, height } => Some(Geometry::Exact { width, height }),
            _ => None,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scale { .. } => write!(f, "scale"),
            Self::ScaleExact { .. } => write!(f, "scale_exact"),
            Self::ScaleWidth { .. } => write!(f, "scale_width"),
            Self::ScaleHeight { .. } => write!(f, "scale_height"),
            Self::Crop { .. } => write!(f, "crop"),
            Self::Grayscale => write!(f, "grayscale"),
            Self::Blur { .. } => write!(f, "blur"),
        }
    }
}

/// Target geometry of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Geometry {
    /// Output is exactly `width` x `height`.
    Exact { width: u32, height: u32 },
    /// Output fits inside `width` x `height`, aspect preserved.
    Bounds { width: u32, height: u32 },
}

impl Geometry {
    /// Configured width and height.
    pub fn size(&self) -> (u32, u32) {
        match *self {
            Self::Exact { width, height } | Self::Bounds { width, height } => (width, height),
        }
    }
}

/// A validated transformation profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    name: String,
    filters: Vec<Filter>,
    geometry: Geometry,
}

impl Profile {
    /// Validate a configured profile.
    ///
    /// Fails with `Error::Configuration` when a filter has invalid
    /// parameters or when no `scale`/`scale_exact` filter gives the profile
    /// a geometry. The last geometry filter wins.
    pub fn new(name: impl Into<String>, filters: Vec<Filter>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::configuration("profile name cannot be empty"));
        }

        for filter in &filters {
            filter
                .validate()
                .map_err(|msg| Error::configuration(format!("profile {}: {}", name, msg)))?;
        }

        let geometry = filters
            .iter()
            .rev()
            .find_map(Filter::geometry)
            .ok_or_else(|| {
                Error::configuration(format!(
                    "profile {} does not define scale or scale_exact",
                    name
                ))
            })?;

        Ok(Self {
            name,
            filters,
            geometry,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Configured output size, usable before a variant exists.
    pub fn declared_size(&self) -> (u32, u32) {
        self.geometry.size()
    }
}

/// The immutable set of profiles loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct Profiles {
    by_name: BTreeMap<String, Profile>,
}

impl Profiles {
    /// Validate every configured profile, failing on the first bad one.
    pub fn from_config(config: &BTreeMap<String, ProfileConfig>) -> Result<Self> {
        let by_name = config
            .iter()
            .map(|(name, pc)| {
                Profile::new(name.clone(), pc.filters.clone()).map(|p| (name.clone(), p))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self { by_name })
    }

    /// Look up a profile; an undefined name is a configuration error.
    pub fn get(&self, name: &str) -> Result<&Profile> {
        self.by_name
            .get(name)
            .ok_or_else(|| Error::configuration(format!("profile {} is not defined", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.by_name.values()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl FromIterator<Profile> for Profiles {
    fn from_iter<I: IntoIterator<Item = Profile>>(iter: I) -> Self {
        Self {
            by_name: iter
                .into_iter()
                .map(|p| (p.name.clone(), p))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_geometry() {
        let profile = Profile::new(
            "thumb",
            vec![Filter::ScaleExact {
                width: 100,
                height: 100,
            }],
        )
        .unwrap();
        assert_eq!(
            profile.geometry(),
            Geometry::Exact {
                width: 100,
                height: 100
            }
        );
        assert_eq!(profile.declared_size(), (100, 100));
    }

    #[test]
    fn test_last_geometry_wins() {
        let profile = Profile::new(
            "banner",
            vec![
                Filter::ScaleExact {
                    width: 800,
                    height: 600,
                },
                Filter::Grayscale,
                Filter::Scale {
                    width: 400,
                    height: 300,
                },
            ],
        )
        .unwrap();
        assert_eq!(
            profile.geometry(),
            Geometry::Bounds {
                width: 400,
                height: 300
            }
        );
    }

    #[test]
    fn test_missing_geometry_rejected() {
        let err = Profile::new(
            "gray",
            vec![Filter::Grayscale, Filter::ScaleWidth { width: 200 }],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("gray"));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let err = Profile::new(
            "broken",
            vec![Filter::Scale {
                width: 0,
                height: 10,
            }],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_bad_blur_rejected() {
        let err = Profile::new(
            "soft",
            vec![
                Filter::Blur { sigma: -1.0 },
                Filter::Scale {
                    width: 10,
                    height: 10,
                },
            ],
        )
        .unwrap_err();
        assert!(err.to_string().contains("sigma"));
    }

    #[test]
    fn test_filter_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            filters: Vec<Filter>,
        }
        let w: Wrapper = toml::from_str(
            r#"
            filters = [
                { op = "crop", x = 1, y = 2, width = 30, height = 40 },
                { op = "scale_exact", width = 100, height = 100 },
                { op = "grayscale" },
            ]
            "#,
        )
        .unwrap();
        assert_eq!(
            w.filters,
            vec![
                Filter::Crop {
                    x: 1,
                    y: 2,
                    width: 30,
                    height: 40
                },
                Filter::ScaleExact {
                    width: 100,
                    height: 100
                },
                Filter::Grayscale,
            ]
        );
    }

    #[test]
    fn test_undefined_profile() {
        let profiles = Profiles::default();
        let err = profiles.get("thumb").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_from_config() {
        let mut config = BTreeMap::new();
        config.insert(
            "thumb".to_string(),
            ProfileConfig {
                filters: vec![Filter::ScaleExact {
                    width: 100,
                    height: 100,
                }],
            },
        );
        let profiles = Profiles::from_config(&config).unwrap();
        assert_eq!(profiles.len(), 1);
        assert!(profiles.contains("thumb"));
        assert_eq!(profiles.get("thumb").unwrap().name(), "thumb");
    }
}
