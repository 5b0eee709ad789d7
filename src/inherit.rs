//! Three-mode attribute inheritance shared by every job attribute category.
//!
//! A sequence records, per category, a value to initialize with, a list of
//! additions and a value to override with. [`Edits::apply`] folds those into a
//! job attribute in a fixed order: initialize (only when the job has no value),
//! then every addition, then override.

use indexmap::{IndexMap, IndexSet};

use crate::cache::Cache;
use crate::image::Image;
use crate::need::NeedRef;
use crate::rule::{Rule, When};

/// A job attribute that can be inherited from enclosing sequences.
pub trait Inheritable: Clone {
    /// What an "add" edit carries for this category.
    type Addition: Clone;

    fn is_unset(&self) -> bool;

    fn add(&mut self, addition: &Self::Addition);
}

#[derive(Debug, Clone)]
pub struct Edits<T: Inheritable> {
    initialize: Option<T>,
    additions: Vec<T::Addition>,
    replacement: Option<T>,
}

impl<T: Inheritable> Default for Edits<T> {
    fn default() -> Self {
        Self {
            initialize: None,
            additions: Vec::new(),
            replacement: None,
        }
    }
}

impl<T: Inheritable> Edits<T> {
    pub fn initialize(&mut self, value: T) {
        self.initialize = Some(value);
    }

    pub fn add(&mut self, addition: T::Addition) {
        self.additions.push(addition);
    }

    pub fn replace(&mut self, value: T) {
        self.replacement = Some(value);
    }

    pub fn is_empty(&self) -> bool {
        self.initialize.is_none() && self.additions.is_empty() && self.replacement.is_none()
    }

    pub fn apply(&self, slot: &mut T) {
        if let Some(initial) = &self.initialize
            && slot.is_unset()
        {
            *slot = initial.clone();
        }
        for addition in &self.additions {
            slot.add(addition);
        }
        if let Some(replacement) = &self.replacement {
            *slot = replacement.clone();
        }
    }
}

impl Inheritable for IndexMap<String, String> {
    type Addition = IndexMap<String, String>;

    fn is_unset(&self) -> bool {
        self.is_empty()
    }

    /// Keys the job already sets are kept.
    fn add(&mut self, addition: &Self::Addition) {
        for (key, value) in addition {
            self.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
}

impl Inheritable for IndexSet<String> {
    type Addition = IndexSet<String>;

    fn is_unset(&self) -> bool {
        self.is_empty()
    }

    fn add(&mut self, addition: &Self::Addition) {
        self.extend(addition.iter().cloned());
    }
}

/// Rules added by a sequence, split by the end of the job's list they go to.
#[derive(Debug, Clone, Default)]
pub struct RuleAddition {
    pub prepend: Vec<Rule>,
    pub append: Vec<Rule>,
}

impl Inheritable for Vec<Rule> {
    type Addition = RuleAddition;

    fn is_unset(&self) -> bool {
        self.is_empty()
    }

    fn add(&mut self, addition: &Self::Addition) {
        self.splice(0..0, addition.prepend.iter().cloned());
        self.extend(addition.append.iter().cloned());
    }
}

impl Inheritable for Option<Vec<NeedRef>> {
    type Addition = Vec<NeedRef>;

    fn is_unset(&self) -> bool {
        self.is_none()
    }

    fn add(&mut self, addition: &Self::Addition) {
        self.get_or_insert_with(Vec::new)
            .extend(addition.iter().cloned());
    }
}

macro_rules! replace_inheritable {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Inheritable for Option<$ty> {
                type Addition = $ty;

                fn is_unset(&self) -> bool {
                    self.is_none()
                }

                fn add(&mut self, addition: &Self::Addition) {
                    *self = Some(addition.clone());
                }
            }
        )+
    };
}

replace_inheritable!(Image, Cache, When, bool, String, u8);

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(values: &[&str]) -> IndexSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn initialize_only_applies_to_unset_values() {
        let mut edits = Edits::default();
        edits.initialize(tags(&["a", "b"]));

        let mut empty = IndexSet::new();
        edits.apply(&mut empty);
        assert_eq!(empty, tags(&["a", "b"]));

        let mut existing = tags(&["c"]);
        edits.apply(&mut existing);
        assert_eq!(existing, tags(&["c"]));
    }

    #[test]
    fn override_wins_over_add_and_initialize() {
        let mut edits = Edits::default();
        edits.replace(tags(&["z"]));
        edits.add(tags(&["x"]));
        edits.initialize(tags(&["y"]));

        let mut value = IndexSet::new();
        edits.apply(&mut value);
        assert_eq!(value, tags(&["z"]));
    }

    #[test]
    fn added_variables_keep_job_values() {
        let mut edits = Edits::default();
        edits.add(IndexMap::from([
            ("A".to_string(), "sequence".to_string()),
            ("B".to_string(), "sequence".to_string()),
        ]));
        let mut variables = IndexMap::from([("A".to_string(), "job".to_string())]);
        edits.apply(&mut variables);
        assert_eq!(variables["A"], "job");
        assert_eq!(variables["B"], "sequence");
    }

    #[test]
    fn rule_additions_keep_batch_order() {
        let mut rules = vec![Rule::new("$JOB")];
        rules.add(&RuleAddition {
            prepend: vec![Rule::new("$A"), Rule::new("$B")],
            append: vec![Rule::new("$Z")],
        });
        let conditions: Vec<_> = rules.iter().filter_map(Rule::condition).collect();
        assert_eq!(conditions, ["$A", "$B", "$JOB", "$Z"]);
    }
}
