use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A page of search results
#[derive(Debug, Clone, Deserialize)]
pub struct ItemCollection {
    #[serde(default)]
    pub features: Vec<Item>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl ItemCollection {
    /// The link to the following page, if the API advertises one
    pub fn next_link(&self) -> Option<&Link> {
        self.links.iter().find(|link| link.rel == "next")
    }
}

/// A STAC item (GeoJSON feature with assets)
#[derive(Debug, Clone, Deserialize)]
pub struct Item {
    pub id: String,
    pub collection: Option<String>,
    pub bbox: Option<Vec<f64>>,
    #[serde(default)]
    pub properties: ItemProperties,
    #[serde(default)]
    pub assets: BTreeMap<String, Asset>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemProperties {
    pub datetime: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub href: String,
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Asset {
    pub fn is_geotiff(&self) -> bool {
        self.media_type
            .as_deref()
            .map(|t| t.starts_with("image/tiff"))
            .unwrap_or(false)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

impl Item {
    /// Pick the asset holding the item's raster data
    ///
    /// GeoTIFF assets with the "data" role win, then any GeoTIFF, then any
    /// asset with the "data" role. Ties resolve by asset key order.
    pub fn raster_asset(&self) -> Option<&Asset> {
        let assets = || self.assets.values();
        assets()
            .find(|a| a.is_geotiff() && a.has_role("data"))
            .or_else(|| assets().find(|a| a.is_geotiff()))
            .or_else(|| assets().find(|a| a.has_role("data")))
    }
}

/// A hypermedia link, used for paging
#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
    pub method: Option<String>,
    pub body: Option<serde_json::Value>,
    #[serde(default)]
    pub merge: bool,
}

/// Body of a POST /search request
#[derive(Debug, Serialize)]
pub(crate) struct SearchRequest<'a> {
    pub(crate) collections: Vec<&'a str>,
    pub(crate) bbox: [f64; 4],
    pub(crate) datetime: &'a str,
    pub(crate) limit: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_with_assets(assets: serde_json::Value) -> Item {
        serde_json::from_value(serde_json::json!({
            "type": "Feature",
            "id": "chirps-2024-01-01",
            "collection": "chirps",
            "properties": { "datetime": "2024-01-01T00:00:00Z" },
            "assets": assets
        }))
        .unwrap()
    }

    #[test]
    fn test_item_deserialization() {
        let item = item_with_assets(serde_json::json!({
            "rfh": {
                "href": "https://example.com/rfh.tif",
                "type": "image/tiff; application=geotiff; profile=cloud-optimized",
                "roles": ["data"]
            }
        }));

        assert_eq!(item.id, "chirps-2024-01-01");
        assert_eq!(item.collection.as_deref(), Some("chirps"));
        assert_eq!(
            item.properties.datetime.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
        assert_eq!(item.assets.len(), 1);
    }

    #[test]
    fn test_raster_asset_prefers_geotiff_data() {
        let item = item_with_assets(serde_json::json!({
            "a_thumbnail": {
                "href": "https://example.com/thumb.png",
                "type": "image/png",
                "roles": ["thumbnail"]
            },
            "b_overview": {
                "href": "https://example.com/overview.tif",
                "type": "image/tiff; application=geotiff",
                "roles": ["overview"]
            },
            "c_data": {
                "href": "https://example.com/data.tif",
                "type": "image/tiff; application=geotiff; profile=cloud-optimized",
                "roles": ["data"]
            }
        }));

        let asset = item.raster_asset().unwrap();
        assert_eq!(asset.href, "https://example.com/data.tif");
    }

    #[test]
    fn test_raster_asset_falls_back_to_any_geotiff() {
        let item = item_with_assets(serde_json::json!({
            "thumbnail": { "href": "https://example.com/thumb.png", "type": "image/png" },
            "band": { "href": "https://example.com/band.tif", "type": "image/tiff" }
        }));

        assert_eq!(
            item.raster_asset().unwrap().href,
            "https://example.com/band.tif"
        );
    }

    #[test]
    fn test_raster_asset_none_without_candidates() {
        let item = item_with_assets(serde_json::json!({
            "metadata": { "href": "https://example.com/meta.json", "type": "application/json" }
        }));

        assert!(item.raster_asset().is_none());
    }

    #[test]
    fn test_next_link() {
        let page: ItemCollection = serde_json::from_value(serde_json::json!({
            "type": "FeatureCollection",
            "features": [],
            "links": [
                { "rel": "self", "href": "https://example.com/search" },
                { "rel": "next", "href": "https://example.com/search?token=abc", "method": "GET" }
            ]
        }))
        .unwrap();

        let next = page.next_link().unwrap();
        assert_eq!(next.href, "https://example.com/search?token=abc");
        assert!(!next.merge);
    }
}
