//! Deterministic attribute naming for vector sinks

/// Assigns names to appended attributes without ever shadowing an existing one.
///
/// Rule: the requested name is truncated to the sink's limit (if any); while it
/// collides with a reserved or previously assigned name, the suffix `_1`, `_2`,
/// ... replaces the tail (truncating further so the result still fits). The
/// same sequence of requests always yields the same names.
#[derive(Debug, Clone)]
pub struct FieldNamer {
    max_len: Option<usize>,
    taken: Vec<String>,
}

impl FieldNamer {
    /// `reserved` holds names that already exist in the collection
    pub fn new<I, S>(reserved: I, max_len: Option<usize>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            max_len,
            taken: reserved.into_iter().map(Into::into).collect(),
        }
    }

    fn is_taken(&self, name: &str) -> bool {
        self.taken.iter().any(|t| t == name)
    }

    fn truncate(name: &str, len: usize) -> &str {
        match name.char_indices().nth(len) {
            Some((idx, _)) => &name[..idx],
            None => name,
        }
    }

    /// Resolve and reserve a name for `requested`
    pub fn assign(&mut self, requested: &str) -> String {
        let base = match self.max_len {
            Some(limit) => Self::truncate(requested, limit),
            None => requested,
        };

        let mut name = base.to_string();
        let mut n = 1usize;
        while self.is_taken(&name) {
            let suffix = format!("_{}", n);
            let stem = match self.max_len {
                Some(limit) => Self::truncate(base, limit.saturating_sub(suffix.len())),
                None => base,
            };
            name = format!("{}{}", stem, suffix);
            n += 1;
        }

        self.taken.push(name.clone());
        name
    }
}
