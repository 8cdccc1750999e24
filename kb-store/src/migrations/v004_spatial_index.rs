//! Reserved spatial index, installed only when `hasRtree` probes true.
//! Nothing in this codebase's current query layer populates or reads it yet;
//! it exists so a future spatially-aware entity type has somewhere to land
//! without a schema migration of its own.

pub const SQL: &str = "
    CREATE VIRTUAL TABLE entity_spatial_idx USING rtree(
        id,
        min_x, max_x,
        min_y, max_y
    );
";
