use std::collections::{BTreeMap, HashMap};

use plotters::coord::Shift;
use plotters::prelude::*;

use super::{draw_placeholder, font_size, padded_bounds, short_label, Render, FONT};
use crate::color::ColorMap;
use crate::data::model::ResistanceTable;
use crate::error::RenderError;
use crate::stats::LinearFit;

/// One antimicrobial group's resistance over time.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendSeries {
    pub group: String,
    /// Raw (Year, PercentageResistant) points in table order.
    pub points: Vec<(i32, f64)>,
    /// Mean per year, sorted by year.
    pub mean_line: Vec<(i32, f64)>,
    /// OLS fit over the raw points, when enough distinct years exist.
    pub fit: Option<LinearFit>,
}

impl TrendSeries {
    fn new(group: String, points: Vec<(i32, f64)>) -> Self {
        let mut per_year: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
        for &(year, pct) in &points {
            let slot = per_year.entry(year).or_insert((0.0, 0));
            slot.0 += pct;
            slot.1 += 1;
        }
        let mean_line = per_year
            .into_iter()
            .map(|(year, (sum, n))| (year, sum / n as f64))
            .collect();
        let xy: Vec<(f64, f64)> = points.iter().map(|&(x, y)| (x as f64, y)).collect();

        TrendSeries {
            group,
            fit: LinearFit::fit(&xy),
            points,
            mean_line,
        }
    }

    pub fn year_span(&self) -> Option<(i32, i32)> {
        let first = self.mean_line.first()?.0;
        let last = self.mean_line.last()?.0;
        Some((first, last))
    }
}

/// Resistance over time, one series per antimicrobial group.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendChart {
    pub title: String,
    pub y_label: String,
    /// Draw fitted lines with 95% bands instead of per-year mean lines.
    pub regression: bool,
    pub series: Vec<TrendSeries>,
}

impl TrendChart {
    /// Split `table` into per-group series in first-seen order.
    /// Rows without a reported percentage are left out.
    pub fn build(table: &ResistanceTable, regression: bool) -> Self {
        let mut slots: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<(&str, Vec<(i32, f64)>)> = Vec::new();
        for obs in &table.observations {
            let Some(pct) = obs.percentage_resistant else {
                continue;
            };
            let group = obs.antimicrobial_group.as_str();
            let slot = *slots.entry(group).or_insert_with(|| {
                groups.push((group, Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push((obs.year, pct));
        }

        TrendChart {
            title: String::new(),
            y_label: "Resistance (%)".to_string(),
            regression,
            series: groups
                .into_iter()
                .map(|(group, points)| TrendSeries::new(group.to_string(), points))
                .collect(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_y_label(mut self, label: impl Into<String>) -> Self {
        self.y_label = label.into();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn year_span(&self) -> Option<(i32, i32)> {
        self.series
            .iter()
            .filter_map(TrendSeries::year_span)
            .reduce(|(lo, hi), (a, b)| (lo.min(a), hi.max(b)))
    }

    fn band(&self, series: &TrendSeries) -> Option<(Vec<(i32, f64)>, Vec<(i32, f64)>)> {
        if !self.regression {
            return None;
        }
        let fit = series.fit?;
        let (first, last) = series.year_span()?;
        let (lower, upper): (Vec<(i32, f64)>, Vec<(i32, f64)>) = (first..=last)
            .map(|year| {
                let (lo, hi) = fit.confidence_interval(year as f64);
                ((year, lo), (year, hi))
            })
            .unzip();
        Some((lower, upper))
    }

    fn value_bounds(&self) -> (f64, f64) {
        let mut values: Vec<f64> = self
            .series
            .iter()
            .flat_map(|s| s.points.iter().map(|p| p.1))
            .collect();
        for series in &self.series {
            if let Some((lower, upper)) = self.band(series) {
                values.extend(lower.iter().chain(upper.iter()).map(|p| p.1));
            }
        }
        let (lo, hi) = padded_bounds(values);
        (lo.min(0.0), hi.max(1.0))
    }
}

impl Render for TrendChart {
    fn draw<DB: DrawingBackend>(&self, area: &DrawingArea<DB, Shift>) -> Result<(), RenderError> {
        let Some((first, last)) = self.year_span() else {
            return draw_placeholder(area, &self.title);
        };

        let font = font_size(area.dim_in_pixel().1);
        let (y_lo, y_hi) = self.value_bounds();
        let colors = ColorMap::new(&self.series.iter().map(|s| s.group.as_str()).collect::<Vec<_>>());

        let mut chart = ChartBuilder::on(area)
            .caption(&self.title, (FONT, font + 2))
            .margin(10)
            .x_label_area_size(font * 3)
            .y_label_area_size(font * 4)
            .build_cartesian_2d((first - 1)..(last + 1), y_lo..y_hi)
            .map_err(RenderError::draw)?;

        chart
            .configure_mesh()
            .x_desc("Year")
            .y_desc(self.y_label.as_str())
            .x_labels(((last - first + 3) as usize).min(12))
            .label_style((FONT, font))
            .draw()
            .map_err(RenderError::draw)?;

        for series in &self.series {
            let color = colors.color_for(&series.group);

            if let (Some((lower, upper)), Some(fit)) = (self.band(series), series.fit) {
                let mut outline = upper.clone();
                outline.extend(lower.iter().rev());
                chart
                    .draw_series(std::iter::once(Polygon::new(outline, color.mix(0.2).filled())))
                    .map_err(RenderError::draw)?;

                let (x0, x1) = (upper[0].0, upper[upper.len() - 1].0);
                chart
                    .draw_series(LineSeries::new(
                        [(x0, fit.predict(x0 as f64)), (x1, fit.predict(x1 as f64))],
                        color.stroke_width(2),
                    ))
                    .map_err(RenderError::draw)?;
            } else {
                chart
                    .draw_series(LineSeries::new(
                        series.mean_line.iter().copied(),
                        color.stroke_width(2),
                    ))
                    .map_err(RenderError::draw)?;
            }

            chart
                .draw_series(
                    series
                        .points
                        .iter()
                        .map(|&(x, y)| Circle::new((x, y), 3, color.filled())),
                )
                .map_err(RenderError::draw)?
                .label(short_label(&series.group, 40))
                .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .label_font((FONT, font.saturating_sub(2).max(8)))
            .background_style(WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(RenderError::draw)?;

        Ok(())
    }

    fn preferred_size(&self) -> (u32, u32) {
        (1200, 800)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use image::GenericImageView;
    use tempfile::TempDir;

    use super::*;
    use crate::chart::export::save;
    use crate::data::filter::{select, Selection};
    use crate::data::model::tests::{obs, table};

    #[test]
    fn one_series_per_group_with_raw_points() {
        let t = table(vec![
            obs("K. pneumoniae", "Greece", "Carbapenems", 2020, Some(12.5)),
            obs("K. pneumoniae", "Greece", "Carbapenems", 2021, Some(15.0)),
        ]);
        let subset = select(&t, &Selection::new().organism("K. pneumoniae").region("Greece"));
        let chart = TrendChart::build(&subset, false);

        assert_eq!(chart.series.len(), 1);
        let s = &chart.series[0];
        assert_eq!(s.group, "Carbapenems");
        assert_eq!(s.points, vec![(2020, 12.5), (2021, 15.0)]);
        assert_eq!(chart.year_span(), Some((2020, 2021)));
    }

    #[test]
    fn duplicate_years_average_in_the_line_but_stay_as_points() {
        let t = table(vec![
            obs("E. coli", "Italy", "Carbapenems", 2021, Some(4.0)),
            obs("E. coli", "Italy", "Carbapenems", 2020, Some(1.0)),
            obs("E. coli", "Italy", "Carbapenems", 2021, Some(6.0)),
            obs("E. coli", "Italy", "Aminoglycosides", 2020, None),
        ]);
        let chart = TrendChart::build(&t, false);
        assert_eq!(chart.series.len(), 1);
        let s = &chart.series[0];
        assert_eq!(s.points.len(), 3);
        assert_eq!(s.mean_line, vec![(2020, 1.0), (2021, 5.0)]);
    }

    #[test]
    fn regression_band_only_where_fit_exists() {
        let t = table(vec![
            obs("K. pneumoniae", "Bulgaria", "Carbapenems", 2018, Some(30.0)),
            obs("K. pneumoniae", "Bulgaria", "Carbapenems", 2019, Some(34.0)),
            obs("K. pneumoniae", "Bulgaria", "Carbapenems", 2020, Some(41.0)),
            obs("K. pneumoniae", "Bulgaria", "Fluoroquinolones", 2020, Some(70.0)),
        ]);
        let chart = TrendChart::build(&t, true);
        let carb = &chart.series[0];
        let fq = &chart.series[1];
        assert!(carb.fit.is_some());
        assert!(fq.fit.is_none());

        let (lower, upper) = chart.band(carb).unwrap();
        assert_eq!(lower.len(), 3);
        assert!(lower.iter().zip(&upper).all(|(l, u)| l.1 <= u.1));
        assert!(chart.band(fq).is_none());

        let without = TrendChart::build(&t, false);
        assert!(without.band(&without.series[0]).is_none());
    }

    #[test]
    fn empty_subset_builds_empty_chart() {
        let chart = TrendChart::build(&table(Vec::new()), true);
        assert!(chart.is_empty());
        assert_eq!(chart.year_span(), None);
    }

    #[test]
    fn renders_regression_band_and_legend() {
        let t = table(vec![
            obs("K. pneumoniae", "Bulgaria", "Carbapenems", 2018, Some(30.0)),
            obs("K. pneumoniae", "Bulgaria", "Carbapenems", 2019, Some(34.0)),
            obs("K. pneumoniae", "Bulgaria", "Carbapenems", 2020, Some(41.0)),
            obs("K. pneumoniae", "Bulgaria", "Fluoroquinolones", 2020, Some(70.0)),
        ]);
        let chart = TrendChart::build(&t, true).with_title("K. pneumoniae, Bulgaria");
        let dir = TempDir::new().unwrap();

        for name in ["trend.png", "trend.svg"] {
            let path = dir.path().join(name);
            save(&chart, &path, (640, 480)).unwrap();
            assert!(fs::metadata(&path).unwrap().len() > 0);
        }
        let img = image::open(dir.path().join("trend.png")).unwrap();
        assert_eq!((img.width(), img.height()), (640, 480));
    }
}
