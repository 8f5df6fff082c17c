pub mod expiring_map;
