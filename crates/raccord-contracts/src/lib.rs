pub mod defects;
pub mod events;
pub mod insights;
pub mod project;
pub mod shots;
pub mod verdict;
pub mod vocabulary;
