//! Builds `filterByFormula` expressions for record listings.

/// A search filter over the launcher's record table. Renders into the
/// provider's formula language.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    query: Option<String>,
    tags: Vec<String>,
    formula: Option<String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive substring match over the Name and Note fields.
    pub fn query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        if !query.trim().is_empty() {
            self.query = Some(query.trim().to_lowercase());
        }
        self
    }

    /// Requires every given tag to be present in the Tags field.
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags
            .into_iter()
            .map(|t| t.into().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        self
    }

    /// A raw formula, used verbatim instead of the assembled clauses.
    pub fn formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    pub fn render(&self) -> String {
        if let Some(formula) = &self.formula {
            return formula.clone();
        }

        // Records with an empty Name are drafts and never surface.
        let mut clauses = vec!["{Name} != ''".to_string()];

        if let Some(query) = &self.query {
            clauses.push(format!(
                "OR(REGEX_MATCH(LOWER({{Name}}), \"{query}\"), REGEX_MATCH(LOWER({{Note}}), \"{query}\"))"
            ));
        }

        // Wrapping the joined tag list in commas turns membership into an
        // exact match, so "rust" does not match "rustling".
        for tag in &self.tags {
            clauses.push(format!(
                "REGEX_MATCH(\",\" & ARRAYJOIN({{Tags}}, \",\") & \",\", \",{tag},\")"
            ));
        }

        if clauses.len() == 1 {
            clauses.remove(0)
        } else {
            format!("AND({})", clauses.join(", "))
        }
    }
}
