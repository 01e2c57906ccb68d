mod assignment_repo;
mod batch_repo;
mod project_repo;
mod task_repo;
mod user_repo;

pub use assignment_repo::AssignmentRepo;
pub(crate) use assignment_repo::COLUMNS as ASSIGNMENT_COLUMNS;
pub use batch_repo::BatchRepo;
pub use project_repo::ProjectRepo;
pub use task_repo::TaskRepo;
pub use user_repo::UserRepo;
