use std::ops::RangeInclusive;

use log::debug;

use super::model::{Observation, ResistanceTable};

// ---------------------------------------------------------------------------
// Selection predicate: a conjunction of column constraints
// ---------------------------------------------------------------------------

/// Categorical columns a constraint can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Organism,
    Region,
    AntimicrobialGroup,
}

impl Category {
    fn of<'a>(&self, obs: &'a Observation) -> &'a str {
        match self {
            Category::Organism => &obs.organism,
            Category::Region => &obs.region,
            Category::AntimicrobialGroup => &obs.antimicrobial_group,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Column value is one of the listed values (a single value = equality).
    OneOf(Category, Vec<String>),
    /// Year lies in the inclusive range.
    Years(RangeInclusive<i32>),
}

impl Constraint {
    pub fn matches(&self, obs: &Observation) -> bool {
        match self {
            Constraint::OneOf(category, values) => {
                let actual = category.of(obs);
                values.iter().any(|v| v == actual)
            }
            Constraint::Years(range) => range.contains(&obs.year),
        }
    }
}

/// A conjunction of constraints. The empty selection matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    constraints: Vec<Constraint>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn organism(self, organism: impl Into<String>) -> Self {
        self.with(Constraint::OneOf(Category::Organism, vec![organism.into()]))
    }

    pub fn region(self, region: impl Into<String>) -> Self {
        self.with(Constraint::OneOf(Category::Region, vec![region.into()]))
    }

    pub fn antimicrobial_group(self, group: impl Into<String>) -> Self {
        self.with(Constraint::OneOf(Category::AntimicrobialGroup, vec![group.into()]))
    }

    /// Restrict a column to any of `values`. An empty list is ignored.
    pub fn one_of(self, category: Category, values: &[String]) -> Self {
        if values.is_empty() {
            return self;
        }
        self.with(Constraint::OneOf(category, values.to_vec()))
    }

    pub fn year(self, year: i32) -> Self {
        self.with(Constraint::Years(year..=year))
    }

    pub fn years(self, range: RangeInclusive<i32>) -> Self {
        self.with(Constraint::Years(range))
    }

    /// Build from optional filter lists, as given on the command line or in a workflow.
    /// `year` and `from`/`to` may be combined; open range ends are unbounded.
    pub fn from_filters(
        organisms: &[String],
        regions: &[String],
        groups: &[String],
        year: Option<i32>,
        from: Option<i32>,
        to: Option<i32>,
    ) -> Self {
        let mut selection = Selection::new()
            .one_of(Category::Organism, organisms)
            .one_of(Category::Region, regions)
            .one_of(Category::AntimicrobialGroup, groups);
        if let Some(year) = year {
            selection = selection.year(year);
        }
        if from.is_some() || to.is_some() {
            selection = selection.years(from.unwrap_or(i32::MIN)..=to.unwrap_or(i32::MAX));
        }
        selection
    }

    /// Human-readable summary, e.g. `Klebsiella pneumoniae, Greece, 2015–2021`.
    pub fn describe(&self) -> String {
        self.constraints
            .iter()
            .map(|c| match c {
                Constraint::OneOf(_, values) => values.join("/"),
                Constraint::Years(range) if range.start() == range.end() => range.start().to_string(),
                Constraint::Years(range) => match (*range.start(), *range.end()) {
                    (i32::MIN, end) => format!("≤{end}"),
                    (start, i32::MAX) => format!("≥{start}"),
                    (start, end) => format!("{start}–{end}"),
                },
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn matches(&self, obs: &Observation) -> bool {
        self.constraints.iter().all(|c| c.matches(obs))
    }
}

/// Return indices of observations that satisfy every constraint, in table order.
pub fn select_indices(table: &ResistanceTable, selection: &Selection) -> Vec<usize> {
    let indices: Vec<usize> = table
        .observations
        .iter()
        .enumerate()
        .filter(|(_, obs)| selection.matches(obs))
        .map(|(i, _)| i)
        .collect();
    debug!(
        "selection {:?} matched {} of {} rows",
        selection.constraints,
        indices.len(),
        table.len()
    );
    indices
}

/// Derived copy of the matching rows. Empty (never an error) when nothing matches.
pub fn select(table: &ResistanceTable, selection: &Selection) -> ResistanceTable {
    table.subset(&select_indices(table, selection))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::{obs, table};

    fn sample() -> ResistanceTable {
        table(vec![
            obs("Klebsiella pneumoniae", "Greece", "Carbapenems", 2020, Some(12.5)),
            obs("Escherichia coli", "Greece", "Carbapenems", 2020, Some(1.0)),
            obs("Klebsiella pneumoniae", "Greece", "Carbapenems", 2021, Some(15.0)),
            obs("Klebsiella pneumoniae", "Sweden", "Fluoroquinolones", 2021, None),
            obs("Klebsiella pneumoniae", "Greece", "Aminoglycosides", 2019, Some(60.0)),
        ])
    }

    #[test]
    fn selection_is_exact_and_ordered() {
        let t = sample();
        let sel = Selection::new()
            .organism("Klebsiella pneumoniae")
            .region("Greece");
        let idx = select_indices(&t, &sel);
        assert_eq!(idx, vec![0, 2, 4]);
        for (i, o) in t.observations.iter().enumerate() {
            assert_eq!(sel.matches(o), idx.contains(&i));
        }
    }

    #[test]
    fn organism_and_region_scenario() {
        let t = table(vec![
            obs("K. pneumoniae", "Greece", "Carbapenems", 2020, Some(12.5)),
            obs("K. pneumoniae", "Greece", "Carbapenems", 2021, Some(15.0)),
        ]);
        let subset = select(&t, &Selection::new().organism("K. pneumoniae").region("Greece"));
        assert_eq!(subset, t);
    }

    #[test]
    fn no_match_is_empty_not_error() {
        let t = sample();
        let subset = select(&t, &Selection::new().organism("Acinetobacter spp.").region("Malta"));
        assert!(subset.is_empty());
    }

    #[test]
    fn empty_selection_keeps_everything() {
        let t = sample();
        assert_eq!(select(&t, &Selection::new()), t);
    }

    #[test]
    fn year_range_and_membership() {
        let t = sample();
        let sel = Selection::new()
            .years(2020..=2021)
            .one_of(
                Category::AntimicrobialGroup,
                &["Carbapenems".to_string(), "Fluoroquinolones".to_string()],
            );
        assert_eq!(select_indices(&t, &sel), vec![0, 1, 2, 3]);

        let single_year = Selection::new().year(2019);
        assert_eq!(select_indices(&t, &single_year), vec![4]);
    }

    #[test]
    fn from_filters_combines_lists_and_years() {
        let t = sample();
        let sel = Selection::from_filters(
            &["Klebsiella pneumoniae".to_string()],
            &[],
            &[],
            None,
            Some(2020),
            None,
        );
        assert_eq!(select_indices(&t, &sel), vec![0, 2, 3]);
        assert_eq!(sel.describe(), "Klebsiella pneumoniae, ≥2020");

        let none = Selection::from_filters(&[], &[], &[], None, None, None);
        assert_eq!(select_indices(&t, &none).len(), t.len());
    }

    #[test]
    fn describe_single_year_and_range() {
        let sel = Selection::new().organism("E. coli").region("Malta").year(2021);
        assert_eq!(sel.describe(), "E. coli, Malta, 2021");
        assert_eq!(Selection::new().years(2015..=2021).describe(), "2015–2021");
    }

    #[test]
    fn empty_membership_list_adds_no_constraint() {
        let sel = Selection::new().one_of(Category::Region, &[]);
        assert!(sel.constraints().is_empty());
    }
}
