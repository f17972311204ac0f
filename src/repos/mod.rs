pub mod mission_repo;
