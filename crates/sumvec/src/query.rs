//! Typed getters over a [`SummarySet`].
//!
//! Every getter resolves its key first and checks the step afterwards, so an
//! unknown variable is reported as `KeyNotFound` whatever the step.

use crate::error::{Result, SummaryError};
use crate::key::VarKey;
use crate::store::{SummarySet, SECONDS_PER_DAY};
use chrono::{DateTime, Utc};

impl SummarySet {
    /// Value of a well variable, e.g. `WOPR` of `OP_1`.
    pub fn well_var(&self, step: usize, well: &str, keyword: &str) -> Result<Option<f64>> {
        self.var(step, &VarKey::well(keyword, well))
    }

    /// Value of a group variable.
    pub fn group_var(&self, step: usize, group: &str, keyword: &str) -> Result<Option<f64>> {
        self.var(step, &VarKey::group(keyword, group))
    }

    /// Value of a region variable.
    pub fn region_var(&self, step: usize, region: u32, keyword: &str) -> Result<Option<f64>> {
        self.var(step, &VarKey::region(keyword, region))
    }

    /// Value of a field variable.
    pub fn field_var(&self, step: usize, keyword: &str) -> Result<Option<f64>> {
        self.var(step, &VarKey::field(keyword))
    }

    /// Value of a well-completion variable.
    pub fn completion_var(
        &self,
        step: usize,
        well: &str,
        keyword: &str,
        completion: u32,
    ) -> Result<Option<f64>> {
        self.var(step, &VarKey::completion(keyword, well, completion))
    }

    /// Value of a miscellaneous variable such as `TIME`.
    pub fn misc_var(&self, step: usize, keyword: &str) -> Result<Option<f64>> {
        self.var(step, &VarKey::misc(keyword))
    }

    /// Value of any variable.
    ///
    /// # Errors
    ///
    /// Returns `SummaryError::KeyNotFound` if the key is not registered, then
    /// `SummaryError::OutOfRange` if the step is invalid.
    pub fn var(&self, step: usize, key: &VarKey) -> Result<Option<f64>> {
        let slot = self.catalog().resolve(key)?;
        self.values().get(step, slot)
    }

    /// Value of a variable given as a general key such as `WOPR:OP_1`.
    ///
    /// # Errors
    ///
    /// Returns `SummaryError::InvalidKey` for malformed key text, otherwise as
    /// [`SummarySet::var`].
    pub fn gen_var(&self, step: usize, key: &str) -> Result<Option<f64>> {
        let key: VarKey = key.parse()?;
        self.var(step, &key)
    }

    /// Raw cell access by step and slot.
    pub fn value_at(&self, step: usize, slot: usize) -> Result<Option<f64>> {
        self.values().get(step, slot)
    }

    /// Raw cell access by simulator ministep.
    ///
    /// # Errors
    ///
    /// Returns `SummaryError::MinistepNotFound` if the ministep was never
    /// loaded.
    pub fn value_at_ministep(&self, ministep: u32, slot: usize) -> Result<Option<f64>> {
        let step = self.time_index().index_of_ministep(ministep)?;
        self.values().get(step, slot)
    }

    /// Whole column of a variable, one entry per step.
    pub fn vector(&self, key: &VarKey) -> Result<Vec<Option<f64>>> {
        let slot = self.catalog().resolve(key)?;
        Ok(self.values().column(slot, 0..self.step_count())?.collect())
    }

    /// Returns true if the well has the variable.
    pub fn has_well_var(&self, well: &str, keyword: &str) -> bool {
        self.catalog().has_well_var(well, keyword)
    }

    /// Calendar time of a step.
    pub fn sim_time(&self, step: usize) -> Result<DateTime<Utc>> {
        self.time_index().time_at(step)
    }

    /// Days elapsed between the start time and a step.
    pub fn sim_days(&self, step: usize) -> Result<f64> {
        let time = self.time_index().timestamp_at(step)?;
        let elapsed = time
            .checked_sub(self.header().start_time)
            .ok_or_else(|| SummaryError::corrupt(format!("time {time} of step {step} overflows")))?;
        Ok(elapsed as f64 / SECONDS_PER_DAY)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{ErrorKind, SummaryError};
    use crate::key::VarKey;
    use crate::store::{DataBatch, StepStamp, SummarySet, ABSENT};
    use chrono::DateTime;

    const START: i64 = 946_684_800;

    fn wopr_set() -> SummarySet {
        let mut set = SummarySet::new("CASE", DateTime::from_timestamp(START, 0).unwrap());
        set.register(VarKey::well("WOPR", "W1"), "SM3/DAY").unwrap();
        set.register(VarKey::completion("COPR", "W1", 2), "SM3/DAY").unwrap();
        set.register(VarKey::region("RPR", 1), "BARSA").unwrap();
        set.register(VarKey::misc("TIME"), "DAYS").unwrap();

        let mut batch = DataBatch::new();
        for (i, wopr) in [10.0, 20.0, 15.0].into_iter().enumerate() {
            let day = i as i64 + 1;
            batch.push(
                StepStamp::new(10 * (i as u32 + 1), 1, START + day * 86_400),
                vec![wopr, ABSENT, 250.0 - i as f64, day as f64],
            );
        }
        set.extend(batch, true).unwrap();
        set
    }

    #[test]
    fn test_well_var() {
        let set = wopr_set();
        assert_eq!(set.well_var(1, "W1", "WOPR").unwrap(), Some(20.0));
        assert_eq!(set.completion_var(1, "W1", "COPR", 2).unwrap(), None);
        assert_eq!(set.region_var(2, 1, "RPR").unwrap(), Some(248.0));
        assert_eq!(set.misc_var(0, "TIME").unwrap(), Some(1.0));
    }

    #[test]
    fn test_unknown_variable_is_not_found_at_any_step() {
        let set = wopr_set();
        for step in [0, 99] {
            let err = set.well_var(step, "W1", "WBAD").unwrap_err();
            assert!(matches!(err, SummaryError::KeyNotFound(_)));
            assert_eq!(err.kind(), ErrorKind::NotFound);
        }
        assert!(matches!(
            set.field_var(0, "FOPT"),
            Err(SummaryError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_step_checked_after_resolution() {
        let set = wopr_set();
        let err = set.well_var(3, "W1", "WOPR").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn test_gen_var() {
        let set = wopr_set();
        assert_eq!(set.gen_var(2, "WOPR:W1").unwrap(), Some(15.0));
        assert_eq!(set.gen_var(2, "RPR:1").unwrap(), Some(248.0));
        assert!(matches!(set.gen_var(0, "RPR:x"), Err(SummaryError::InvalidKey(_))));
    }

    #[test]
    fn test_ministep_access() {
        let set = wopr_set();
        assert_eq!(set.value_at_ministep(20, 0).unwrap(), Some(20.0));
        assert!(matches!(
            set.value_at_ministep(15, 0),
            Err(SummaryError::MinistepNotFound(15))
        ));
        assert_eq!(set.value_at(2, 0).unwrap(), Some(15.0));
    }

    #[test]
    fn test_vector_and_time() {
        let set = wopr_set();
        let vector = set.vector(&VarKey::well("WOPR", "W1")).unwrap();
        assert_eq!(vector, vec![Some(10.0), Some(20.0), Some(15.0)]);
        assert_eq!(set.sim_days(2).unwrap(), 3.0);
        assert_eq!(set.sim_time(0).unwrap().timestamp(), START + 86_400);
        assert!(set.has_well_var("W1", "WOPR"));
        assert!(!set.has_well_var("W2", "WOPR"));
    }
}
