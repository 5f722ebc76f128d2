//! Configuration loading for the swap pipeline.
//!
//! TOML file with `${ENV_VAR}` substitution, schema validation of the raw
//! document before typed deserialization, and a small set of environment
//! overrides for deployment knobs.

use std::env;
use std::path::Path;
use thiserror::Error;
use tierswap_types::{Field, FieldType, Schema};

mod types;

pub use types::*;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Configuration loader with environment variable substitution.
#[derive(Default)]
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "TIERSWAP_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<Config, ConfigError> {
		let file_path = self.file_path.as_ref().ok_or_else(|| {
			ConfigError::FileNotFound("No configuration file specified".to_string())
		})?;

		let content = tokio::fs::read_to_string(file_path).await?;
		let mut config = self.parse(&content)?;
		self.apply_env_overrides(&mut config)?;
		Ok(config)
	}

	/// Parses and validates a configuration document.
	pub fn parse(&self, content: &str) -> Result<Config, ConfigError> {
		let substituted = self.substitute_env_vars(content)?;

		let raw: toml::Value = substituted
			.parse()
			.map_err(|e: toml::de::Error| ConfigError::ParseError(e.to_string()))?;
		validate_document(&raw)?;

		let config: Config =
			raw.try_into().map_err(|e| ConfigError::ParseError(e.to_string()))?;
		validate_semantics(&config)?;

		Ok(config)
	}

	fn substitute_env_vars(&self, content: &str) -> Result<String, ConfigError> {
		let mut result = content.to_string();

		let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
		for cap in re.captures_iter(content) {
			let full_match = &cap[0];
			let var_name = &cap[1];

			let env_value = env::var(var_name)
				.map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
			result = result.replace(full_match, &env_value);
		}

		Ok(result)
	}

	fn apply_env_overrides(&self, config: &mut Config) -> Result<(), ConfigError> {
		if let Ok(rpc_url) = env::var(format!("{}RPC_URL", self.env_prefix)) {
			config.chain.rpc_url = rpc_url;
		}

		if let Ok(http_port) = env::var(format!("{}HTTP_PORT", self.env_prefix)) {
			config.api.http_port = http_port
				.parse()
				.map_err(|e| ConfigError::ValidationError(format!("Invalid HTTP port: {}", e)))?;
		}

		Ok(())
	}
}

/// Structural validation of the raw document, section by section, before
/// typed deserialization so errors carry field names.
fn validate_document(raw: &toml::Value) -> Result<(), ConfigError> {
	let table = raw
		.as_table()
		.ok_or_else(|| ConfigError::ValidationError("configuration must be a table".into()))?;

	let section = |name: &str| -> Result<&toml::Value, ConfigError> {
		table
			.get(name)
			.ok_or_else(|| ConfigError::ValidationError(format!("missing [{}] section", name)))
	};

	let chain_schema = Schema::new(
		vec![
			Field::new("rpc_url", FieldType::String).with_validator(|value| {
				let url = value.as_str().unwrap();
				if url.starts_with("http://") || url.starts_with("https://") {
					Ok(())
				} else {
					Err("RPC URL must start with http:// or https://".to_string())
				}
			}),
			Field::new(
				"chain_id",
				FieldType::Integer {
					min: Some(1),
					max: None,
				},
			),
		],
		vec![],
	);
	chain_schema
		.validate(section("chain")?)
		.map_err(|e| ConfigError::ValidationError(format!("[chain] {}", e)))?;

	let account_schema = Schema::new(
		vec![Field::new("private_key", FieldType::String).with_validator(|value| {
			let key = value.as_str().unwrap();
			let key_without_prefix = key.strip_prefix("0x").unwrap_or(key);
			if key_without_prefix.len() != 64 {
				return Err("Private key must be 64 hex characters (32 bytes)".to_string());
			}
			if hex_check(key_without_prefix) {
				Ok(())
			} else {
				Err("Private key must be valid hexadecimal".to_string())
			}
		})],
		vec![],
	);
	account_schema
		.validate(section("account")?)
		.map_err(|e| ConfigError::ValidationError(format!("[account] {}", e)))?;

	let contracts_schema = Schema::new(
		vec![
			Field::address("pool_manager"),
			Field::address("state_view"),
			Field::address("router"),
			Field::address("permit2"),
			Field::address("hook"),
		],
		vec![],
	);
	contracts_schema
		.validate(section("contracts")?)
		.map_err(|e| ConfigError::ValidationError(format!("[contracts] {}", e)))?;

	if let Some(risk) = table.get("risk") {
		let fraction = |name: &str| {
			Field::new(
				name,
				FieldType::Float {
					min: Some(0.0),
					max: Some(1.0),
				},
			)
		};
		let risk_schema = Schema::new(
			vec![],
			vec![
				Field::new("k", FieldType::Float { min: Some(0.0), max: None }),
				fraction("weight_impact"),
				fraction("weight_stress"),
				fraction("partner_max"),
				fraction("retail_max"),
				fraction("elevated_max"),
				Field::new("bonded", FieldType::Boolean),
			],
		);
		risk_schema
			.validate(risk)
			.map_err(|e| ConfigError::ValidationError(format!("[risk] {}", e)))?;
	}

	if let Some(markout) = table.get("markout") {
		let markout_schema = Schema::new(
			vec![],
			vec![
				Field::new(
					"confirmation_depth",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
				Field::new(
					"health_threshold",
					FieldType::Float {
						min: Some(-1.0),
						max: Some(1.0),
					},
				),
				Field::new(
					"gas_limit",
					FieldType::Integer {
						min: Some(21_000),
						max: None,
					},
				),
			],
		);
		markout_schema
			.validate(markout)
			.map_err(|e| ConfigError::ValidationError(format!("[markout] {}", e)))?;
	}

	Ok(())
}

fn hex_check(s: &str) -> bool {
	!s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Cross-field checks that the per-section schemas cannot express.
fn validate_semantics(config: &Config) -> Result<(), ConfigError> {
	let r = &config.risk;
	if (r.weight_impact + r.weight_stress - 1.0).abs() > 1e-9 {
		return Err(ConfigError::ValidationError(
			"[risk] weight_impact and weight_stress must sum to 1.0".to_string(),
		));
	}
	if !(r.partner_max < r.retail_max && r.retail_max < r.elevated_max && r.elevated_max < 1.0) {
		return Err(ConfigError::ValidationError(
			"[risk] tier thresholds must be strictly increasing and below 1.0".to_string(),
		));
	}
	if config.execution.poll_interval_secs == 0 {
		return Err(ConfigError::ValidationError(
			"[execution] poll_interval_secs must be positive".to_string(),
		));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	const MINIMAL: &str = r#"
[chain]
rpc_url = "http://localhost:8545"
chain_id = 31337

[account]
private_key = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d"

[contracts]
pool_manager = "0x00000000000000000000000000000000000000a1"
state_view = "0x00000000000000000000000000000000000000a2"
router = "0x00000000000000000000000000000000000000a3"
permit2 = "0x00000000000000000000000000000000000000a4"
hook = "0x00000000000000000000000000000000000000a5"
"#;

	#[test]
	fn minimal_config_gets_defaults() {
		let config = ConfigLoader::new().parse(MINIMAL).unwrap();
		assert_eq!(config.risk.k, 100.0);
		assert_eq!(config.execution.deadline_secs, 3600);
		assert_eq!(config.markout.confirmation_depth, 10);
		assert_eq!(config.pool.fee, 0x800000);
		assert!(!config.risk.bonded);
	}

	#[test]
	fn missing_section_is_rejected() {
		let err = ConfigLoader::new().parse("[chain]\nrpc_url = \"http://x\"\nchain_id = 1\n");
		assert!(err.is_err());
	}

	#[test]
	fn bad_rpc_scheme_is_rejected() {
		let doc = MINIMAL.replace("http://localhost:8545", "ws://localhost:8545");
		assert!(matches!(
			ConfigLoader::new().parse(&doc),
			Err(ConfigError::ValidationError(_))
		));
	}

	#[test]
	fn bad_weights_are_rejected() {
		let doc = format!("{}\n[risk]\nweight_impact = 0.6\nweight_stress = 0.3\n", MINIMAL);
		assert!(matches!(
			ConfigLoader::new().parse(&doc),
			Err(ConfigError::ValidationError(_))
		));
	}

	#[test]
	fn env_substitution_fills_placeholders() {
		env::set_var("TIERSWAP_TEST_KEY_VAR", "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d");
		let doc = MINIMAL.replace(
			"\"0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d\"",
			"\"${TIERSWAP_TEST_KEY_VAR}\"",
		);
		let config = ConfigLoader::new().parse(&doc).unwrap();
		assert!(config.account.private_key.starts_with("0x59c6"));
	}

	#[test]
	fn missing_env_var_is_an_error() {
		let doc = MINIMAL.replace(
			"\"0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d\"",
			"\"${TIERSWAP_DEFINITELY_UNSET_VAR}\"",
		);
		assert!(matches!(
			ConfigLoader::new().parse(&doc),
			Err(ConfigError::EnvVarNotFound(_))
		));
	}

	#[test]
	fn wad_conversions_are_exact_for_config_fractions() {
		assert_eq!(wad_from_fraction(0.1), 100_000_000_000_000_000);
		assert_eq!(wad_from_fraction(0.3), 300_000_000_000_000_000);
		assert_eq!(wad_from_fraction(0.7), 700_000_000_000_000_000);
		assert_eq!(wad_from_fraction(100.0), 100_000_000_000_000_000_000);
		assert_eq!(wad_from_signed_fraction(0.2), 200_000_000_000_000_000);
	}
}
