//! Stepped color scale for the choropleth layer.

/// The 6-class ColorBrewer `YlOrRd` palette, light to dark.
pub const YL_OR_RD: [&str; 6] = [
    "#ffffb2", "#fed976", "#feb24c", "#fd8d3c", "#f03b20", "#bd0026",
];

/// Maps values to palette colors using equal-width bins.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorScale {
    thresholds: Vec<f64>,
    colors: &'static [&'static str],
}

impl ColorScale {
    /// Split `[min, max]` into one equal-width bin per palette color.
    pub fn linear(min: f64, max: f64, colors: &'static [&'static str]) -> Self {
        let bins = colors.len();
        let step = (max - min) / bins as f64;
        let thresholds = (0..=bins)
            .map(|i| if i == bins { max } else { min + step * i as f64 })
            .collect();

        Self { thresholds, colors }
    }

    /// `YlOrRd` scale over `[min, max]`.
    pub fn yl_or_rd(min: f64, max: f64) -> Self {
        Self::linear(min, max, &YL_OR_RD)
    }

    /// Bin edges, `colors.len() + 1` values from min to max.
    #[cfg(test)]
    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    /// Color of the bin containing `value`. Values on an inner edge fall into
    /// the upper bin; values outside the range use the nearest end color.
    pub fn color_for(&self, value: f64) -> &'static str {
        let inner = &self.thresholds[1..self.thresholds.len() - 1];
        let index = inner.iter().filter(|edge| value >= **edge).count();
        self.colors[index.min(self.colors.len() - 1)]
    }

    /// `(color, lower, upper)` for every bin, for the legend.
    pub fn bins(&self) -> Vec<(&'static str, f64, f64)> {
        self.colors
            .iter()
            .zip(self.thresholds.windows(2))
            .map(|(color, edge)| (*color, edge[0], edge[1]))
            .collect()
    }
}
