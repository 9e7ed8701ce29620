//! Place resolution: free-text place names to map coordinates
//!
//! The resolver classifies an address as domestic or international, then
//! walks tiered provider lookups (direct geocode, region-aware search,
//! fallback geocode), caching every outcome and bounding concurrency to
//! respect the map provider's rate limit.

mod provider;
mod resolver;

pub use provider::{BaiduProvider, GeocodeProvider};
pub use resolver::{PlaceResolver, ResolverConfig};

use serde::{Deserialize, Serialize};

/// A WGS84-like coordinate pair as used by the map provider; no
/// reprojection is performed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Rough bounding box of mainland China used to sanity-check results
const HOME_LAT_RANGE: (f64, f64) = (18.0, 54.0);
const HOME_LNG_RANGE: (f64, f64) = (73.0, 135.0);

/// Whether a point falls inside the home-country bounding box
pub fn in_home_box(point: GeoPoint) -> bool {
    point.lat >= HOME_LAT_RANGE.0
        && point.lat <= HOME_LAT_RANGE.1
        && point.lng >= HOME_LNG_RANGE.0
        && point.lng <= HOME_LNG_RANGE.1
}

/// Country names and major foreign city names that mark a destination as
/// international, in both local and romanized-adjacent forms
const INTERNATIONAL_KEYWORDS: &[&str] = &[
    // countries
    "日本", "韩国", "泰国", "新加坡", "马来西亚", "印度尼西亚", "菲律宾", "越南", "柬埔寨",
    "缅甸", "老挝", "美国", "加拿大", "墨西哥", "巴西", "阿根廷", "智利", "秘鲁", "哥伦比亚",
    "英国", "法国", "德国", "意大利", "西班牙", "葡萄牙", "荷兰", "比利时", "瑞士", "奥地利",
    "希腊", "土耳其", "俄罗斯", "澳大利亚", "新西兰", "斐济", "埃及", "南非", "肯尼亚",
    "摩洛哥", "印度", "斯里兰卡", "尼泊尔", "不丹", "马尔代夫", "迪拜", "阿联酋", "卡塔尔",
    "沙特阿拉伯", "以色列", "约旦", "冰岛", "挪威", "瑞典", "丹麦", "芬兰", "捷克", "波兰",
    "匈牙利", "克罗地亚", "塞尔维亚",
    // major cities
    "东京", "大阪", "京都", "首尔", "曼谷", "吉隆坡", "雅加达", "纽约", "洛杉矶", "旧金山",
    "芝加哥", "波士顿", "华盛顿", "多伦多", "温哥华", "伦敦", "巴黎", "柏林", "罗马", "马德里",
    "巴塞罗那", "阿姆斯特丹", "维也纳", "苏黎世", "雅典", "悉尼", "墨尔本", "奥克兰", "开罗",
    "开普敦", "内罗毕", "新德里", "孟买", "科伦坡", "加德满都", "多哈", "利雅得", "特拉维夫",
    "雷克雅未克", "奥斯陆", "斯德哥尔摩", "哥本哈根", "赫尔辛基", "布拉格", "华沙", "布达佩斯",
    "萨格勒布",
];

/// Classify an address as an international destination
///
/// Case-insensitive containment against the fixed keyword list; everything
/// else is treated as domestic.
pub fn is_international_destination(address: &str) -> bool {
    let lower = address.to_lowercase();
    INTERNATIONAL_KEYWORDS
        .iter()
        .any(|keyword| lower.contains(&keyword.to_lowercase()))
}

/// Great-circle distance between two points in kilometers
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_by_country_and_city() {
        assert!(is_international_destination("日本东京"));
        assert!(is_international_destination("巴黎左岸"));
        assert!(!is_international_destination("北京"));
        assert!(!is_international_destination("杭州西湖"));
    }

    #[test]
    fn test_home_bounding_box() {
        let beijing = GeoPoint {
            lat: 39.9,
            lng: 116.4,
        };
        let tokyo = GeoPoint {
            lat: 35.7,
            lng: 139.7,
        };
        assert!(in_home_box(beijing));
        assert!(!in_home_box(tokyo));
    }

    #[test]
    fn test_haversine_beijing_shanghai() {
        let beijing = GeoPoint {
            lat: 39.9042,
            lng: 116.4074,
        };
        let shanghai = GeoPoint {
            lat: 31.2304,
            lng: 121.4737,
        };
        let d = haversine_km(beijing, shanghai);
        assert!((1000.0..1150.0).contains(&d), "got {d}");
    }
}
