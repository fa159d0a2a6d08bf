use serde::Serialize;

/// MÁVINFORM 铁路公告页面
pub const MAVINFORM_TRAINS_URL: &str =
    "https://www.mavcsoport.hu/mavinform?field_modalitas_value%5B%5D=vasut";

/// MÁVINFORM 的地区范围，地区聊天室以显示名作为房间标识
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Territory {
    pub id: u32,
    pub display_name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

const fn territory(id: u32, display_name: &'static str, lat: f64, lng: f64) -> Territory {
    Territory {
        id,
        display_name,
        lat,
        lng,
    }
}

pub const TERRITORIES: [Territory; 21] = [
    territory(10868, "Budapest", 47.4979, 19.0402),
    territory(10870, "Balaton", 46.92, 17.89),
    territory(10840, "Bács-Kiskun", 46.6, 19.25),
    territory(10841, "Baranya", 46.0667, 18.2333),
    territory(10843, "Békés", 46.68, 21.05),
    territory(10844, "Borsod-Abaúj-Zemplén", 48.1, 20.8),
    territory(10846, "Csongrád-Csanád", 46.25, 20.15),
    territory(10847, "Fejér", 47.2, 18.42),
    territory(10849, "Győr-Moson-Sopron", 47.6833, 17.65),
    territory(10850, "Hajdú-Bihar", 47.53, 21.62),
    territory(10852, "Heves", 47.9, 20.35),
    territory(10853, "Jász-Nagykun-Szolnok", 47.2, 20.2),
    territory(10855, "Komárom-Esztergom", 47.56, 18.3),
    territory(10856, "Nógrád", 48.0, 19.65),
    territory(10858, "Pest", 47.3, 19.4),
    territory(11046, "Somogy", 46.4, 17.7),
    territory(10859, "Szabolcs-Szatmár-Bereg", 47.95, 22.0),
    territory(10861, "Tolna", 46.5, 18.6),
    territory(10862, "Vas", 47.25, 16.75),
    territory(10864, "Veszprém", 47.1, 17.9),
    territory(10865, "Zala", 46.8, 16.85),
];

impl Territory {
    /// 按显示名查找（不区分大小写）
    pub fn from_name(name: &str) -> Option<&'static Territory> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let wanted = name.to_lowercase();
        TERRITORIES
            .iter()
            .find(|territory| territory.display_name.to_lowercase() == wanted)
    }

    pub fn url(&self) -> String {
        format!(
            "{}&field_territorial_scope_target_id%5B%5D={}",
            MAVINFORM_TRAINS_URL, self.id
        )
    }
}
