pub mod missions;
