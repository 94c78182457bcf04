//! Key catalog: resolves variable keys to dense value-store slots.
//!
//! Slots are assigned in registration order starting from zero and are never
//! reused. Entity name lists (wells, groups, regions) keep first-registration
//! order.

use crate::error::{Result, SummaryError};
use crate::key::{validate_name, validate_text, VarCategory, VarKey};
use std::collections::{HashMap, HashSet};
use xxhash_rust::xxh64::Xxh64;

/// A registered summary variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// Identity of the variable.
    pub key: VarKey,
    /// Unit string, e.g. `SM3/DAY`. May be empty.
    pub unit: String,
    /// Assigned column in the value store.
    pub slot: usize,
}

/// Mapping from variable keys to slots, with a reverse array for enumeration.
#[derive(Debug, Clone, Default)]
pub struct KeyCatalog {
    slots: HashMap<VarKey, usize>,
    variables: Vec<Variable>,
    wells: Vec<String>,
    well_set: HashSet<String>,
    groups: Vec<String>,
    group_set: HashSet<String>,
    regions: Vec<u32>,
    region_set: HashSet<u32>,
}

impl KeyCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a variable and returns its slot.
    ///
    /// Registering an existing key with the same unit returns the existing
    /// slot.
    ///
    /// # Errors
    ///
    /// Returns `SummaryError::InvalidKey` for unusable names or units and
    /// `SummaryError::UnitMismatch` if the key exists with another unit.
    pub fn register(&mut self, key: VarKey, unit: impl Into<String>) -> Result<usize> {
        let unit = unit.into();
        validate_text("unit", &unit)?;
        if let Some(&slot) = self.slots.get(&key) {
            let existing = &self.variables[slot];
            if existing.unit != unit {
                return Err(SummaryError::UnitMismatch {
                    key: key.to_string(),
                    expected: existing.unit.clone(),
                    found: unit,
                });
            }
            return Ok(slot);
        }

        key.validate()?;
        match &key {
            VarKey::Well { well, .. } | VarKey::Completion { well, .. } => {
                self.note_well(well);
            }
            VarKey::Group { group, .. } => self.note_group(group),
            VarKey::Region { region, .. } => {
                if self.region_set.insert(*region) {
                    self.regions.push(*region);
                }
            }
            VarKey::Field { .. } | VarKey::Misc { .. } => {}
        }

        let slot = self.variables.len();
        self.slots.insert(key.clone(), slot);
        self.variables.push(Variable { key, unit, slot });
        Ok(slot)
    }

    /// Declares a well that may not (yet) have variables.
    pub fn register_well(&mut self, well: &str) -> Result<()> {
        validate_name(well)?;
        self.note_well(well);
        Ok(())
    }

    /// Declares a group that may not (yet) have variables.
    pub fn register_group(&mut self, group: &str) -> Result<()> {
        validate_name(group)?;
        self.note_group(group);
        Ok(())
    }

    fn note_well(&mut self, well: &str) {
        if !self.well_set.contains(well) {
            self.well_set.insert(well.to_string());
            self.wells.push(well.to_string());
        }
    }

    fn note_group(&mut self, group: &str) {
        if !self.group_set.contains(group) {
            self.group_set.insert(group.to_string());
            self.groups.push(group.to_string());
        }
    }

    /// Resolves a key to its slot.
    ///
    /// # Errors
    ///
    /// Returns `SummaryError::KeyNotFound` if the key was never registered.
    pub fn resolve(&self, key: &VarKey) -> Result<usize> {
        self.slots
            .get(key)
            .copied()
            .ok_or_else(|| SummaryError::KeyNotFound(key.to_string()))
    }

    /// Returns true if the key is registered.
    pub fn has_key(&self, key: &VarKey) -> bool {
        self.slots.contains_key(key)
    }

    /// Returns true if the well has a variable with this keyword.
    pub fn has_well_var(&self, well: &str, keyword: &str) -> bool {
        self.has_key(&VarKey::well(keyword, well))
    }

    /// Non-failing existence check for an entity of a category.
    ///
    /// Wells and groups count if they were declared or carry variables;
    /// `entity` is parsed as a number for regions. Field and misc ignore
    /// `entity` and report whether any variable of that category exists.
    pub fn has(&self, category: VarCategory, entity: &str) -> bool {
        match category {
            VarCategory::Well => self.well_set.contains(entity),
            VarCategory::Group => self.group_set.contains(entity),
            VarCategory::Region => entity
                .parse::<u32>()
                .map(|region| self.region_set.contains(&region))
                .unwrap_or(false),
            VarCategory::Completion => self
                .variables
                .iter()
                .any(|v| matches!(&v.key, VarKey::Completion { well, .. } if well == entity)),
            VarCategory::Field | VarCategory::Misc => {
                self.variables.iter().any(|v| v.key.category() == category)
            }
        }
    }

    /// Returns the variable stored in a slot.
    ///
    /// # Errors
    ///
    /// Returns `SummaryError::OutOfRange` if the slot is not assigned.
    pub fn variable(&self, slot: usize) -> Result<&Variable> {
        self.variables
            .get(slot)
            .ok_or_else(|| SummaryError::out_of_range("slot", slot, self.variables.len()))
    }

    /// Returns the category of the variable in a slot.
    pub fn category_of(&self, slot: usize) -> Result<VarCategory> {
        Ok(self.variable(slot)?.key.category())
    }

    /// Returns the unit of a registered key.
    pub fn unit(&self, key: &VarKey) -> Result<&str> {
        let slot = self.resolve(key)?;
        Ok(&self.variables[slot].unit)
    }

    /// Returns all variables in slot order.
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Iterates over the variables of one well, in slot order.
    pub fn well_variables<'a>(&'a self, well: &'a str) -> impl Iterator<Item = &'a Variable> + 'a {
        self.variables
            .iter()
            .filter(move |v| matches!(&v.key, VarKey::Well { well: w, .. } if w == well))
    }

    /// Number of registered variables (and value-store columns).
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Returns true if no variable is registered.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Well names in first-registration order.
    pub fn well_names(&self) -> &[String] {
        &self.wells
    }

    /// Group names in first-registration order.
    pub fn group_names(&self) -> &[String] {
        &self.groups
    }

    /// Region numbers in first-registration order.
    pub fn region_numbers(&self) -> &[u32] {
        &self.regions
    }

    /// Number of distinct wells.
    pub fn num_wells(&self) -> usize {
        self.wells.len()
    }

    /// Number of distinct groups.
    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Number of distinct regions.
    pub fn num_regions(&self) -> usize {
        self.regions.len()
    }

    /// Hash of the ordered key list.
    ///
    /// Data batches record the fingerprint of the catalog they were written
    /// against, so a batch can be matched to its header.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = Xxh64::new(0);
        for variable in &self.variables {
            hasher.update(&[variable.key.category() as u8]);
            hasher.update(variable.key.to_string().as_bytes());
            hasher.update(&[0]);
        }
        hasher.digest()
    }
}
