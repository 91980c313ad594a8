pub const CREATE_WARNINGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS warnings (
    id               TEXT PRIMARY KEY,
    kind             TEXT NOT NULL,
    polygon          TEXT NOT NULL,
    issued_at        TEXT NOT NULL,
    duration_minutes INTEGER NOT NULL,
    expires_at       TEXT NOT NULL,
    wind             TEXT,
    hail             TEXT,
    threat           TEXT,
    author           TEXT,
    info             TEXT,
    possible_tag     TEXT,
    active           INTEGER NOT NULL DEFAULT 1,
    created_at       TEXT NOT NULL
);
"#;

pub const CREATE_ISSUE_DATE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_warnings_issue_date ON warnings (substr(issued_at, 1, 10));
"#;

pub const CREATE_ACTIVE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_warnings_active ON warnings (active, expires_at);
"#;

pub const UPSERT_WARNING: &str = r#"
INSERT INTO warnings (
    id, kind, polygon, issued_at, duration_minutes, expires_at,
    wind, hail, threat, author, info, possible_tag, active, created_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
ON CONFLICT (id) DO UPDATE SET
    kind = excluded.kind,
    polygon = excluded.polygon,
    issued_at = excluded.issued_at,
    duration_minutes = excluded.duration_minutes,
    expires_at = excluded.expires_at,
    wind = excluded.wind,
    hail = excluded.hail,
    threat = excluded.threat,
    author = excluded.author,
    info = excluded.info,
    possible_tag = excluded.possible_tag,
    active = excluded.active;
"#;

pub const MARK_INACTIVE: &str = r#"
UPDATE warnings SET active = 0 WHERE id = $1 AND active = 1;
"#;

pub const SELECT_ACTIVE: &str = r#"
SELECT * FROM warnings WHERE active = 1 AND expires_at > $1 ORDER BY issued_at ASC;
"#;

pub const SELECT_BY_ISSUE_DATE: &str = r#"
SELECT * FROM warnings WHERE substr(issued_at, 1, 10) = $1 ORDER BY issued_at ASC;
"#;
