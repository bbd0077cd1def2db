//! Team repository.

use crate::model::team::Team;
use crate::repo::crud::CrudRepository;
use log::info;

/// Repository for `Team` entities; CRUD only.
#[derive(Debug, Clone, Copy, Default)]
pub struct TeamRepository;

impl TeamRepository {
    pub fn register() -> Self {
        info!("event=repo_register module=repo status=ok repository=TeamRepository queries=0");
        Self
    }
}

impl CrudRepository<Team> for TeamRepository {}
