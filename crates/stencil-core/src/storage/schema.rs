pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL,
  slug TEXT NOT NULL UNIQUE,
  status TEXT NOT NULL DEFAULT 'draft',
  content TEXT NOT NULL,
  instructions TEXT,
  model TEXT NOT NULL,
  temperature REAL,
  max_tokens INTEGER,
  metadata TEXT NOT NULL DEFAULT '{}',
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS versions (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
  version_number INTEGER NOT NULL,
  content TEXT NOT NULL,
  instructions TEXT,
  model TEXT NOT NULL,
  temperature REAL,
  max_tokens INTEGER,
  metadata TEXT NOT NULL DEFAULT '{}',
  change_description TEXT NOT NULL,
  created_at TEXT NOT NULL,
  UNIQUE (document_id, version_number)
);

CREATE TRIGGER IF NOT EXISTS versions_immutable
BEFORE UPDATE ON versions
BEGIN
  SELECT RAISE(ABORT, 'versions are immutable');
END;

CREATE TABLE IF NOT EXISTS parameters (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
  name TEXT NOT NULL,
  param_type TEXT NOT NULL,
  required INTEGER NOT NULL DEFAULT 1,
  default_value TEXT,
  description TEXT,
  rules_json TEXT NOT NULL DEFAULT '{}',
  position INTEGER NOT NULL,
  UNIQUE (document_id, name)
);

CREATE TABLE IF NOT EXISTS evaluation_sets (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
  name TEXT NOT NULL,
  grader_type TEXT NOT NULL,
  grader_config TEXT NOT NULL DEFAULT '{}',
  remote_eval_id TEXT,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS test_cases (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  evaluation_set_id INTEGER NOT NULL REFERENCES evaluation_sets(id) ON DELETE CASCADE,
  input_variables TEXT NOT NULL DEFAULT '{}',
  expected_output TEXT NOT NULL,
  description TEXT
);

CREATE TABLE IF NOT EXISTS evaluation_runs (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  evaluation_set_id INTEGER NOT NULL REFERENCES evaluation_sets(id) ON DELETE CASCADE,
  version_id INTEGER NOT NULL REFERENCES versions(id) ON DELETE CASCADE,
  status TEXT NOT NULL,
  started_at TEXT,
  completed_at TEXT,
  total_count INTEGER NOT NULL DEFAULT 0,
  passed_count INTEGER NOT NULL DEFAULT 0,
  failed_count INTEGER NOT NULL DEFAULT 0,
  remote_run_id TEXT,
  remote_file_id TEXT,
  report_url TEXT,
  error_message TEXT,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS workflows (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL UNIQUE,
  description TEXT,
  steps_json TEXT NOT NULL,
  created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_versions_document ON versions(document_id);
CREATE INDEX IF NOT EXISTS idx_parameters_document ON parameters(document_id);
CREATE INDEX IF NOT EXISTS idx_runs_set ON evaluation_runs(evaluation_set_id);
"#;
