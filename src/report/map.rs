//! HTML choropleth page.
//!
//! The page is self-contained apart from Leaflet (loaded from a CDN) and the
//! map tiles. Two layers are drawn: a choropleth over every boundary,
//! colored by `Infections_logarithm`, and a transparent tooltip layer over
//! the prefectures that joined with a summary.

use super::scale::ColorScale;
use crate::analysis::logarithm_range;
use crate::config::Config;
use crate::dashboard::{MapView, View};
use crate::models::DateRange;
use anyhow::{Context, Result};
use serde_json::{json, Value};

const LEAFLET_CSS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css";
const LEAFLET_JS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";

/// Escape text for use inside HTML elements and attributes.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Serialize a value for embedding inside a `<script>` element.
fn script_json(value: &Value) -> Result<String> {
    let text = serde_json::to_string(value).context("Failed to serialize map data")?;
    Ok(text.replace("</", "<\\/"))
}

/// Render the page for a view: the map, or the no-data message.
pub fn generate_html_page(view: &View<'_>, config: &Config) -> Result<String> {
    let body = match view {
        View::Map(map) => generate_map_section(map, config)?,
        View::NoData { .. } => format!(
            "<h1 class=\"no-data\">{}</h1>\n",
            escape_html(&config.labels.no_data)
        ),
    };

    let mut page = String::new();

    page.push_str("<!DOCTYPE html>\n<html lang=\"ja\">\n<head>\n");
    page.push_str("<meta charset=\"utf-8\">\n");
    page.push_str(
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n",
    );
    page.push_str(&format!(
        "<title>🗾 {}</title>\n",
        escape_html(&config.labels.page_title)
    ));
    page.push_str(&format!("<link rel=\"stylesheet\" href=\"{}\">\n", LEAFLET_CSS));
    page.push_str(&format!("<script src=\"{}\"></script>\n", LEAFLET_JS));
    page.push_str(&generate_style(config));
    page.push_str("</head>\n<body>\n");
    page.push_str("<div class=\"layout\">\n");
    page.push_str("<main class=\"map-col\">\n");
    page.push_str(&body);
    page.push_str("</main>\n");
    page.push_str(&generate_sidebar(view.range(), view.bounds(), config));
    page.push_str("</div>\n</body>\n</html>\n");

    Ok(page)
}

fn generate_style(config: &Config) -> String {
    format!(
        "<style>\n\
         body {{ margin: 0; font-family: sans-serif; }}\n\
         .layout {{ display: flex; gap: 1rem; padding: 1rem; }}\n\
         .map-col {{ flex: 4; }}\n\
         .menu-col {{ flex: 1; }}\n\
         #map {{ width: 100%; height: {}px; }}\n\
         .legend {{ background: white; padding: 6px 8px; font-size: 12px; line-height: 18px; }}\n\
         .legend i {{ width: 18px; height: 18px; float: left; margin-right: 6px; opacity: {}; }}\n\
         .prefmap-tooltip {{ background-color: white; color: #333333; font-family: arial; font-size: 12px; padding: 10px; }}\n\
         .prefmap-tooltip th {{ text-align: left; padding-right: 6px; }}\n\
         </style>\n",
        config.map.height_px, config.map.fill_opacity
    )
}

/// Sidebar mirroring the range inputs: selected range and selectable span.
fn generate_sidebar(range: DateRange, bounds: DateRange, config: &Config) -> String {
    let labels = &config.labels;
    let mut section = String::new();

    section.push_str("<aside class=\"menu-col\">\n");
    section.push_str(&format!("<h2>{}</h2>\n", escape_html(&labels.filter_heading)));
    section.push_str("<dl>\n");
    for (label, date) in [(&labels.start_date, range.start), (&labels.end_date, range.end)] {
        section.push_str(&format!(
            "<dt>{}</dt>\n<dd><input type=\"date\" value=\"{}\" min=\"{}\" max=\"{}\" readonly></dd>\n",
            escape_html(label),
            date.format("%Y-%m-%d"),
            bounds.start.format("%Y-%m-%d"),
            bounds.end.format("%Y-%m-%d"),
        ));
    }
    section.push_str("</dl>\n");
    section.push_str("</aside>\n");

    section
}

/// Tooltip body for one joined prefecture.
fn tooltip_html(rows: &[(&str, String)]) -> String {
    let mut html = String::from("<table class=\"prefmap-tooltip\">");
    for (label, value) in rows {
        html.push_str(&format!(
            "<tr><th>{}</th><td>{}</td></tr>",
            escape_html(label),
            escape_html(value)
        ));
    }
    html.push_str("</table>");
    html
}

/// Choropleth layer data: every boundary with its fill color.
fn choropleth_layer(map: &MapView<'_>, scale: &ColorScale, config: &Config) -> Value {
    let by_code = map.summaries_by_code();
    let features: Vec<Value> = map
        .boundaries
        .features()
        .iter()
        .map(|feature| {
            let (fill, opacity) = match by_code.get(&feature.id) {
                Some(summary) => (
                    scale.color_for(summary.infections_logarithm).to_string(),
                    config.map.fill_opacity,
                ),
                None => (config.map.nan_fill_color.clone(), config.map.nan_fill_opacity),
            };

            json!({
                "type": "Feature",
                "geometry": feature.geometry,
                "properties": {
                    "id": feature.id,
                    "fill": fill,
                    "fillOpacity": opacity,
                },
            })
        })
        .collect();

    json!({ "type": "FeatureCollection", "features": features })
}

/// Tooltip layer data: joined prefectures only.
fn tooltip_layer(map: &MapView<'_>, config: &Config) -> Value {
    let labels = &config.labels;
    let report = &config.report;

    let features: Vec<Value> = map
        .joined()
        .into_iter()
        .map(|joined| {
            let summary = joined.summary;
            let rows = [
                (labels.name.as_str(), joined.feature.display_name()),
                (labels.infections.as_str(), summary.infections.to_string()),
                (
                    labels.percentage.as_str(),
                    format!(
                        "{:.*}",
                        report.percentage_decimals, summary.infections_percentage
                    ),
                ),
                (
                    labels.logarithm.as_str(),
                    format!(
                        "{:.*}",
                        report.logarithm_decimals, summary.infections_logarithm
                    ),
                ),
            ];

            json!({
                "type": "Feature",
                "geometry": joined.feature.geometry,
                "properties": {
                    "id": joined.feature.id,
                    "tooltip": tooltip_html(&rows),
                },
            })
        })
        .collect();

    json!({ "type": "FeatureCollection", "features": features })
}

fn legend_data(scale: &ColorScale, config: &Config) -> Value {
    let bins: Vec<Value> = scale
        .bins()
        .into_iter()
        .map(|(color, lower, upper)| {
            json!({
                "color": color,
                "label": format!("{:.2} - {:.2}", lower, upper),
            })
        })
        .collect();

    json!({ "title": config.labels.legend, "bins": bins })
}

fn generate_map_section(map: &MapView<'_>, config: &Config) -> Result<String> {
    let (min, max) = logarithm_range(&map.summaries).unwrap_or((0.0, 0.0));
    let scale = ColorScale::yl_or_rd(min, max);

    let settings = json!({
        "center": [config.map.center_lat, config.map.center_lon],
        "zoom": config.map.zoom,
        "tiles": config.map.tiles,
        "attribution": config.map.attribution,
        "lineOpacity": config.map.line_opacity,
    });

    let mut section = String::new();
    section.push_str("<div id=\"map\"></div>\n<script>\n");
    section.push_str(&format!("const settings = {};\n", script_json(&settings)?));
    section.push_str(&format!(
        "const choropleth = {};\n",
        script_json(&choropleth_layer(map, &scale, config))?
    ));
    section.push_str(&format!(
        "const tooltips = {};\n",
        script_json(&tooltip_layer(map, config))?
    ));
    section.push_str(&format!(
        "const legend = {};\n",
        script_json(&legend_data(&scale, config))?
    ));
    section.push_str(MAP_SCRIPT);
    section.push_str("</script>\n");

    Ok(section)
}

const MAP_SCRIPT: &str = r#"const map = L.map('map').setView(settings.center, settings.zoom);
L.tileLayer(settings.tiles, { attribution: settings.attribution, subdomains: 'abcd', maxZoom: 19 }).addTo(map);
L.geoJSON(choropleth, {
  style: (f) => ({
    fillColor: f.properties.fill,
    fillOpacity: f.properties.fillOpacity,
    color: 'black',
    weight: 1,
    opacity: settings.lineOpacity,
  }),
}).addTo(map);
const info = L.geoJSON(tooltips, {
  style: () => ({ fillColor: '#ffffff', color: '#000000', fillOpacity: 0.1, weight: 0.1 }),
  onEachFeature: (f, layer) => {
    layer.bindTooltip(f.properties.tooltip, { sticky: true });
    layer.on('mouseover', () => layer.setStyle({ fillColor: '#000000', fillOpacity: 0.5 }));
    layer.on('mouseout', () => info.resetStyle(layer));
  },
}).addTo(map);
info.bringToFront();
const legendControl = L.control({ position: 'topright' });
legendControl.onAdd = () => {
  const div = L.DomUtil.create('div', 'legend');
  const title = document.createElement('strong');
  title.textContent = legend.title;
  div.appendChild(title);
  for (const bin of legend.bins) {
    const row = document.createElement('div');
    const swatch = document.createElement('i');
    swatch.style.background = bin.color;
    row.appendChild(swatch);
    row.appendChild(document.createTextNode(bin.label));
    div.appendChild(row);
  }
  return div;
};
legendControl.addTo(map);
"#;
