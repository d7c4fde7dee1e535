/// Column-name constants for the rental-pricekit schema.
/// Single source of truth - exported to Python via PyO3.

// ── Observation columns (calculation view, uppercase) ───────────────────────
pub mod obs {
    pub const LOCALIDADE: &str = "LOCALIDADE";
    pub const RETIRADA: &str = "RETIRADA";
    /// Raw survey-date column as it arrives in the snapshot.
    pub const DATA: &str = "DATA";
    /// Time-of-day field, recombined with the date part of DATA.
    pub const HORA: &str = "HORA";
    /// Rebuilt survey timestamp (date of DATA + HORA).
    pub const DATA_HORA: &str = "DATA_HORA";
    pub const DURACAO: &str = "DURAÇÃO";
    pub const CATEGORIA: &str = "CATEGORIA";
    pub const LOCADORA: &str = "LOCADORA";
    pub const PLANO: &str = "PLANO";
    pub const PRECO: &str = "PREÇO";

    /// Columns the snapshot must carry for normalization to proceed.
    pub const SNAPSHOT_REQUIRED: [&str; 9] = [
        LOCALIDADE, RETIRADA, DATA, HORA, DURACAO, CATEGORIA, LOCADORA, PLANO, PRECO,
    ];

    /// Columns that must be non-null in every cleaned observation.
    pub const ROW_REQUIRED: [&str; 7] = [
        PRECO, DATA_HORA, RETIRADA, LOCALIDADE, LOCADORA, CATEGORIA, PLANO,
    ];
}

// ── Comparison view columns (lowercase) ─────────────────────────────────────
pub mod cmp {
    pub const LOCALIDADE: &str = "localidade";
    pub const RETIRADA: &str = "retirada";
    pub const DURACAO: &str = "duração";
    pub const CATEGORIA: &str = "categoria";
    pub const LOCADORA: &str = "locadora";
    pub const PLANO: &str = "plano";
    pub const PRECO: &str = "preço";
}

// ── Comparison report display labels ────────────────────────────────────────
pub mod report {
    pub const LOCALIDADE: &str = "LOCALIDADE";
    pub const RETIRADA: &str = "RETIRADA";
    pub const DURACAO: &str = "DURAÇÃO";
    pub const CATEGORIA: &str = "CATEGORIA";
    pub const PRECO_ANTERIOR: &str = "PREÇO ANTERIOR";
    pub const PRECO_ATUAL: &str = "PREÇO ATUAL";
    pub const VARIACAO: &str = "VARIAÇÃO %";
    pub const LOCADORA_ANTERIOR: &str = "LOCADORA MAIS BARATA (ANTERIOR)";
    pub const LOCADORA_ATUAL: &str = "LOCADORA MAIS BARATA (ATUAL)";
    pub const PLANO_ANTERIOR: &str = "PLANO ANTERIOR";
    pub const PLANO_ATUAL: &str = "PLANO ATUAL";

    /// Fixed output column order of the comparison table.
    pub const ORDER: [&str; 11] = [
        LOCALIDADE,
        RETIRADA,
        DURACAO,
        CATEGORIA,
        PRECO_ANTERIOR,
        PRECO_ATUAL,
        VARIACAO,
        LOCADORA_ANTERIOR,
        LOCADORA_ATUAL,
        PLANO_ANTERIOR,
        PLANO_ATUAL,
    ];
}

// ── Vendors ─────────────────────────────────────────────────────────────────
pub mod vendor {
    /// Distinguished reference vendor for positioning distance.
    pub const REFERENCE: &str = "Foco";
}

// ── Categories ──────────────────────────────────────────────────────────────
pub mod category {
    /// Placeholder/aggregate categories excluded during cleaning.
    pub const INVALID: [&str; 2] = ["-", "L+"];
}

// ── Sentinels ───────────────────────────────────────────────────────────────
pub mod sentinel {
    /// Distance-matrix cell when the reference vendor is the only one present.
    pub const UNIQUE: &str = "Único";
    /// Fill value for absent (row, column) combinations in dense matrices.
    pub const EMPTY_CELL: &str = "-";
    /// Freshness label when the snapshot file does not exist.
    pub const FILE_MISSING: &str = "Arquivo não encontrado";
    /// Freshness label when the snapshot exists but cannot be normalized.
    pub const LOAD_FAILED: &str = "Erro ao carregar dados";
    /// Freshness label before any load attempt.
    pub const NOT_LOADED: &str = "N/A";
    /// Access-log location when reverse geolocation fails.
    pub const UNKNOWN_LOCATION: &str = "Localização desconhecida";
}

// ── Date/time display formats ───────────────────────────────────────────────
pub mod datefmt {
    pub const ISO_DATE: &str = "%Y-%m-%d";
    pub const ISO_DATETIME: &str = "%Y-%m-%d %H:%M:%S";
    /// Positioning-by-location row labels.
    pub const DAY_MONTH_YEAR: &str = "%d/%m/%Y";
    /// Positioning-by-category column labels.
    pub const DAY_MONTH: &str = "%d/%m";
    /// Snapshot freshness indicator.
    pub const FRESHNESS: &str = "%d/%m/%Y %H:%M:%S";
}
