use std::collections::HashMap;

use shared::domain::{Fencer, FencerId};

/// Read-only lookup of fencer identities, loaded once per process.
#[derive(Debug, Clone, Default)]
pub struct RosterIndex {
    fencers: HashMap<FencerId, Fencer>,
}

impl RosterIndex {
    pub fn from_records(records: impl IntoIterator<Item = Fencer>) -> Self {
        Self {
            fencers: records
                .into_iter()
                .map(|fencer| (fencer.id.clone(), fencer))
                .collect(),
        }
    }

    pub fn lookup(&self, id: &FencerId) -> Option<&Fencer> {
        self.fencers.get(id)
    }

    pub fn len(&self) -> usize {
        self.fencers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fencers.is_empty()
    }
}

impl FromIterator<Fencer> for RosterIndex {
    fn from_iter<I: IntoIterator<Item = Fencer>>(iter: I) -> Self {
        Self::from_records(iter)
    }
}
