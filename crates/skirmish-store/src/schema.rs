//! Document store database schema.

/// SQL to create the combat state table. Mirrors the first migration.
pub const CREATE_COMBAT_STATES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS combat_states (
    encounter_id UUID PRIMARY KEY,
    version      BIGINT NOT NULL CHECK (version > 0),
    state        JSONB NOT NULL,
    updated_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_matches_first_migration() {
        let migration = include_str!("../../../migrations/0001_create_combat_states.sql");

        assert_eq!(migration.trim(), CREATE_COMBAT_STATES_TABLE.trim());
    }
}
