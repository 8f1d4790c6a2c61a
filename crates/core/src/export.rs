use chrono::SecondsFormat;

use crate::models::Pin;

pub const CSV_CONTENT_TYPE: &str = "text/csv;charset=utf-8";
pub const KML_CONTENT_TYPE: &str = "application/vnd.google-earth.kml+xml";

pub fn to_csv(pins: &[Pin]) -> String {
    let mut lines = vec!["Name,Description,Latitude,Longitude,Created At".to_string()];
    lines.extend(pins.iter().map(|pin| {
        format!(
            "{},{},{},{},{}",
            csv_quote(&pin.name),
            csv_quote(pin.description.as_deref().unwrap_or("")),
            pin.lat,
            pin.lng,
            pin.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }));
    lines.join("\n")
}

pub fn to_kml(map_name: &str, pins: &[Pin]) -> String {
    let placemarks = pins
        .iter()
        .map(|pin| {
            let description = pin
                .description
                .as_deref()
                .map(|text| format!("\n      <description>{}</description>", xml_escape(text)))
                .unwrap_or_default();
            format!(
                "\n    <Placemark>\n      <name>{}</name>{}\n      <Point>\n        <coordinates>{},{},0</coordinates>\n      </Point>\n    </Placemark>",
                xml_escape(&pin.name),
                description,
                pin.lng,
                pin.lat
            )
        })
        .collect::<String>();

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<kml xmlns=\"http://www.opengis.net/kml/2.2\">\n  <Document>\n    <name>{}</name>\n    <description>Collaborative map pins exported from pinplace</description>{}\n  </Document>\n</kml>",
        xml_escape(map_name),
        placemarks
    )
}

/// `"Team Offsite!"` -> `team_offsite__pins.csv`
pub fn export_file_name(map_name: &str, extension: &str) -> String {
    let stem = map_name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect::<String>();
    format!("{stem}_pins.{extension}")
}

fn csv_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
