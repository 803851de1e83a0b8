//! Lifecycle hook runner.
//!
//! Runs each (agent, plugin) pair strictly sequentially: hooks may have
//! ordering dependencies, and interactive collection presents one prompt at
//! a time to a single operator. Onboard hooks walk
//! CHECK_RUNONCE -> COLLECT_INPUTS -> INVOKE -> SUCCESS/FAILURE; resolve
//! hooks share the INVOKE/outcome shape but are non-interactive and exist
//! only to fill auto-resolvable secrets.

use super::invoke::{invoke, parse_resolution_lines, HookInvocation, DEFAULT_HOOK_TIMEOUT};
use super::prompt::Prompter;
use crate::env::EnvDict;
use crate::error::{FleetError, Result};
use crate::plugins::{HookInput, OnboardHook, Plugin, PluginRegistry, ResolveHook, SecretScope};
use crate::secrets::redact::redact;
use crate::secrets::reference::{camel_case_key, role_env_var};
use crate::secrets::{AgentSeed, AutoResolved, ResolvedSecrets};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnboardOutcome {
    /// runOnce hook whose required secrets were already satisfied
    Skipped,
    /// Hook ran; instructions are already redacted
    Completed { instructions: Option<String> },
}

#[derive(Debug, Clone)]
pub struct HookReport {
    pub agent: String,
    pub plugin: String,
    pub outcome: OnboardOutcome,
}

pub struct HookRunner<'a> {
    registry: &'a PluginRegistry,
    env: &'a EnvDict,
    timeout: Duration,
}

impl<'a> HookRunner<'a> {
    pub fn new(registry: &'a PluginRegistry, env: &'a EnvDict) -> Self {
        Self {
            registry,
            env,
            timeout: DEFAULT_HOOK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run every hook for every agent, in order. The accumulator collects
    /// auto-resolved values and operator-collected inputs so later plugins
    /// (on any agent) see them without re-resolving.
    pub fn run_all(
        &self,
        agents: &[AgentSeed],
        resolved: &ResolvedSecrets,
        acc: &mut AutoResolved,
        prompter: &mut dyn Prompter,
    ) -> Result<Vec<HookReport>> {
        let mut reports = Vec::new();

        for seed in agents {
            for plugin_name in &seed.plugins {
                let plugin = self.registry.get_plugin(plugin_name).ok_or_else(|| {
                    FleetError::InvalidManifest(format!(
                        "agent '{}' declares unknown plugin '{}'",
                        seed.name, plugin_name
                    ))
                })?;

                if let Some(hook) = plugin.manifest.hooks.onboard.clone() {
                    let outcome =
                        self.run_onboard(seed, &plugin, &hook, resolved, acc, prompter)?;
                    reports.push(HookReport {
                        agent: seed.name.clone(),
                        plugin: plugin_name.clone(),
                        outcome,
                    });
                }

                if let Some(hook) = plugin.manifest.hooks.resolve.clone() {
                    self.run_resolve(seed, &plugin, &hook, resolved, acc)?;
                }
            }
        }

        Ok(reports)
    }

    pub fn run_onboard(
        &self,
        seed: &AgentSeed,
        plugin: &Arc<Plugin>,
        hook: &OnboardHook,
        resolved: &ResolvedSecrets,
        acc: &mut AutoResolved,
        prompter: &mut dyn Prompter,
    ) -> Result<OnboardOutcome> {
        // CHECK_RUNONCE: skip when the plugin has required secrets and every
        // one is already satisfied. Re-running setup after secrets are in
        // place must not re-invoke the hook.
        if hook.run_once {
            let required: Vec<_> = plugin
                .manifest
                .secrets
                .iter()
                .filter(|(_, spec)| !spec.auto_resolvable)
                .collect();
            if !required.is_empty()
                && required
                    .iter()
                    .all(|(key, spec)| self.secret_satisfied(seed, key, spec, resolved, acc))
            {
                return Ok(OnboardOutcome::Skipped);
            }
        }

        // COLLECT_INPUTS: prompt in declared order. The plugin's setup
        // instructions are shown once, before the first prompt, whichever
        // input carries them.
        let instructions_text = hook
            .inputs
            .iter()
            .find_map(|input| input.instructions.as_deref());
        let mut inputs: BTreeMap<String, String> = BTreeMap::new();
        let mut instructions_shown = false;
        for input in &hook.inputs {
            let from_env = self
                .env
                .get(&input.env_var)
                .or_else(|| self.env.get(&role_env_var(&seed.role, &input.env_var)))
                .or_else(|| acc.lookup_env(&input.env_var))
                .map(str::to_string);

            let value = match from_env {
                Some(value) => value,
                None => self.collect_interactive(
                    input,
                    instructions_text,
                    &mut instructions_shown,
                    prompter,
                )?,
            };
            inputs.insert(input.env_var.clone(), value);
        }

        // INVOKE: already-resolved secrets mapped back to their declared env
        // vars, plus the freshly collected inputs.
        let mut hook_env = self.secret_env(seed, plugin, resolved, acc);
        hook_env.extend(inputs.clone());

        let script = plugin.script(&hook.script).ok_or_else(|| {
            FleetError::InvalidManifest(format!(
                "plugin '{}' script '{}' not embedded",
                plugin.id(),
                hook.script
            ))
        })?;
        let script_name = format!("{}-onboard.sh", plugin.id());

        match invoke(script, &script_name, &hook_env, self.timeout)? {
            HookInvocation::Ok { stdout } => {
                // Collected inputs become resolved secrets for the rest of
                // the pass (gap reporting, assembler, later hooks).
                for (env_var, value) in &inputs {
                    let key = camel_case_key(env_var);
                    acc.insert(&seed.name, &key, env_var, value.clone());
                    acc.insert(
                        &seed.name,
                        &key,
                        &role_env_var(&seed.role, env_var),
                        value.clone(),
                    );
                }

                let instructions = self.redact_instructions(&stdout, resolved, acc, &inputs);
                Ok(OnboardOutcome::Completed { instructions })
            }
            HookInvocation::Failed { detail } => Err(FleetError::HookFailure {
                plugin: plugin.id().to_string(),
                agent: seed.name.clone(),
                message: detail,
            }),
        }
    }

    /// Resolve hooks auto-fill secrets no operator should be asked for.
    /// Failure is fatal: a downstream required secret would otherwise
    /// silently remain unset.
    pub fn run_resolve(
        &self,
        seed: &AgentSeed,
        plugin: &Arc<Plugin>,
        hook: &ResolveHook,
        resolved: &ResolvedSecrets,
        acc: &mut AutoResolved,
    ) -> Result<()> {
        let pending: Vec<_> = plugin
            .manifest
            .secrets
            .iter()
            .filter(|(key, spec)| {
                spec.auto_resolvable && !self.secret_satisfied(seed, key, spec, resolved, acc)
            })
            .map(|(key, spec)| (key.clone(), spec.clone()))
            .collect();

        // Everything already known (earlier agent, environment): no re-run
        if pending.is_empty() {
            return Ok(());
        }

        let hook_env = self.secret_env(seed, plugin, resolved, acc);
        let script = plugin.script(&hook.script).ok_or_else(|| {
            FleetError::InvalidManifest(format!(
                "plugin '{}' script '{}' not embedded",
                plugin.id(),
                hook.script
            ))
        })?;
        let script_name = format!("{}-resolve.sh", plugin.id());

        match invoke(script, &script_name, &hook_env, self.timeout)? {
            HookInvocation::Ok { stdout } => {
                let values = parse_resolution_lines(&stdout);
                for (key, spec) in pending {
                    if let Some(value) = values.get(&spec.env_var) {
                        acc.insert(&seed.name, &key, &spec.env_var, value.clone());
                        acc.insert(
                            &seed.name,
                            &key,
                            &role_env_var(&seed.role, &spec.env_var),
                            value.clone(),
                        );
                    }
                }
                Ok(())
            }
            HookInvocation::Failed { detail } => Err(FleetError::HookFailure {
                plugin: plugin.id().to_string(),
                agent: seed.name.clone(),
                message: detail,
            }),
        }
    }

    fn collect_interactive(
        &self,
        input: &HookInput,
        instructions: Option<&str>,
        instructions_shown: &mut bool,
        prompter: &mut dyn Prompter,
    ) -> Result<String> {
        if !*instructions_shown {
            if let Some(instructions) = instructions {
                prompter.show(instructions);
            }
            *instructions_shown = true;
        }

        loop {
            let Some(answer) = prompter.prompt(&input.prompt)? else {
                return Err(FleetError::Cancelled);
            };
            if answer.is_empty() {
                continue;
            }
            if let Some(prefix) = &input.prefix {
                if !answer.starts_with(prefix.as_str()) {
                    prompter.show(&format!("Value must start with '{}'", prefix));
                    continue;
                }
            }
            return Ok(answer);
        }
    }

    fn secret_satisfied(
        &self,
        seed: &AgentSeed,
        key: &str,
        spec: &crate::plugins::SecretSpec,
        resolved: &ResolvedSecrets,
        acc: &AutoResolved,
    ) -> bool {
        let effective_var = match spec.scope {
            SecretScope::Agent => role_env_var(&seed.role, &spec.env_var),
            SecretScope::Global => spec.env_var.clone(),
        };
        resolved.get(&seed.name, key).is_some()
            || acc.get(&seed.name, key).is_some()
            || acc.lookup_env(&effective_var).is_some()
            || self.env.contains(&effective_var)
    }

    /// Known values for this plugin's secrets, keyed by declared env var.
    fn secret_env(
        &self,
        seed: &AgentSeed,
        plugin: &Plugin,
        resolved: &ResolvedSecrets,
        acc: &AutoResolved,
    ) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        for (key, spec) in &plugin.manifest.secrets {
            let effective_var = match spec.scope {
                SecretScope::Agent => role_env_var(&seed.role, &spec.env_var),
                SecretScope::Global => spec.env_var.clone(),
            };
            let value = resolved
                .get(&seed.name, key)
                .or_else(|| acc.get(&seed.name, key))
                .or_else(|| acc.lookup_env(&effective_var))
                .or_else(|| self.env.get(&effective_var))
                .map(str::to_string);
            if let Some(value) = value {
                env.insert(spec.env_var.clone(), value);
            }
        }
        env
    }

    fn redact_instructions(
        &self,
        stdout: &str,
        resolved: &ResolvedSecrets,
        acc: &AutoResolved,
        inputs: &BTreeMap<String, String>,
    ) -> Option<String> {
        let text = stdout.trim();
        if text.is_empty() {
            return None;
        }

        let mut known: Vec<(String, String)> = resolved
            .all_values()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        known.extend(acc.all_values().map(|(k, v)| (k.to_string(), v.to_string())));
        known.extend(
            inputs
                .iter()
                .map(|(var, v)| (camel_case_key(var), v.clone())),
        );

        // Non-sensitive values (team ids and the like) stay visible; the
        // operator may need them in the follow-up steps
        let public = self.registry.non_secret_keys();
        known.retain(|(key, _)| !public.contains(key));

        Some(redact(
            text,
            known.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::prompt::ScriptedPrompter;
    use crate::plugins::registry::load_plugin;
    use std::collections::HashMap;

    const TEST_PLUGIN: &str = r#"
        [plugin]
        id = "chat"
        name = "Chat"
        description = "test plugin"

        [secrets.chatBotToken]
        env_var = "CHAT_BOT_TOKEN"
        prefix = "bot-"
        scope = "agent"

        [secrets.chatTeamId]
        env_var = "CHAT_TEAM_ID"
        is_secret = false
        auto_resolvable = true
        scope = "agent"

        [hooks.onboard]
        description = "collect the chat token"
        run_once = true
        script = "onboard.sh"

        [[hooks.onboard.inputs]]
        env_var = "CHAT_BOT_TOKEN"
        prompt = "Chat bot token"
        prefix = "bot-"
        instructions = "Create a bot and copy its token."

        [hooks.resolve]
        script = "resolve.sh"
    "#;

    fn test_plugin(onboard: &'static str, resolve: &'static str) -> Arc<Plugin> {
        Arc::new(
            load_plugin(TEST_PLUGIN, &[("onboard.sh", onboard), ("resolve.sh", resolve)])
                .unwrap(),
        )
    }

    fn seed() -> AgentSeed {
        AgentSeed {
            name: "agent-eng".to_string(),
            role: "eng".to_string(),
            plugins: vec!["chat".to_string()],
            ..Default::default()
        }
    }

    fn env(pairs: &[(&str, &str)]) -> EnvDict {
        EnvDict::from_map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        )
    }

    fn runner<'a>(registry: &'a PluginRegistry, env: &'a EnvDict) -> HookRunner<'a> {
        HookRunner::new(registry, env).with_timeout(Duration::from_secs(10))
    }

    #[test]
    fn test_runonce_skips_when_secrets_satisfied() {
        let registry = PluginRegistry::load().unwrap();
        let dict = env(&[("ENG_CHAT_BOT_TOKEN", "bot-abc123")]);
        let plugin = test_plugin("exit 1", "exit 1"); // would fail if invoked
        let hook = plugin.manifest.hooks.onboard.clone().unwrap();

        let mut acc = AutoResolved::default();
        let mut prompter = ScriptedPrompter::default();
        let outcome = runner(&registry, &dict)
            .run_onboard(
                &seed(),
                &plugin,
                &hook,
                &ResolvedSecrets::default(),
                &mut acc,
                &mut prompter,
            )
            .unwrap();

        assert_eq!(outcome, OnboardOutcome::Skipped);
        assert!(prompter.prompts.is_empty());
    }

    #[test]
    fn test_inputs_taken_from_env_without_prompting() {
        let registry = PluginRegistry::load().unwrap();
        let dict = env(&[("CHAT_BOT_TOKEN", "bot-from-env")]);
        let plugin = test_plugin("echo \"got $CHAT_BOT_TOKEN\" >/dev/null", "exit 0");
        let mut hook = plugin.manifest.hooks.onboard.clone().unwrap();
        hook.run_once = false;

        let mut acc = AutoResolved::default();
        let mut prompter = ScriptedPrompter::default();
        let outcome = runner(&registry, &dict)
            .run_onboard(
                &seed(),
                &plugin,
                &hook,
                &ResolvedSecrets::default(),
                &mut acc,
                &mut prompter,
            )
            .unwrap();

        assert!(matches!(outcome, OnboardOutcome::Completed { .. }));
        assert!(prompter.prompts.is_empty());
        // Collected input is visible to the rest of the pass
        assert_eq!(acc.get("agent-eng", "chatBotToken"), Some("bot-from-env"));
        assert_eq!(acc.lookup_env("ENG_CHAT_BOT_TOKEN"), Some("bot-from-env"));
    }

    #[test]
    fn test_interactive_collection_enforces_prefix() {
        let registry = PluginRegistry::load().unwrap();
        let dict = env(&[]);
        let plugin = test_plugin("exit 0", "exit 0");
        let mut hook = plugin.manifest.hooks.onboard.clone().unwrap();
        hook.run_once = false;

        let mut acc = AutoResolved::default();
        let mut prompter = ScriptedPrompter::new(["wrong-prefix", "bot-valid"]);
        let outcome = runner(&registry, &dict)
            .run_onboard(
                &seed(),
                &plugin,
                &hook,
                &ResolvedSecrets::default(),
                &mut acc,
                &mut prompter,
            )
            .unwrap();

        assert!(matches!(outcome, OnboardOutcome::Completed { .. }));
        assert_eq!(prompter.prompts.len(), 2);
        // Instructions shown exactly once, plus the prefix complaint
        assert_eq!(
            prompter.shown,
            vec![
                "Create a bot and copy its token.".to_string(),
                "Value must start with 'bot-'".to_string()
            ]
        );
        assert_eq!(acc.get("agent-eng", "chatBotToken"), Some("bot-valid"));
    }

    #[test]
    fn test_inputs_prompted_in_declared_order_with_instructions_first() {
        let registry = PluginRegistry::load().unwrap();
        let dict = env(&[]);
        let plugin = test_plugin("exit 0", "exit 0");
        let mut hook = plugin.manifest.hooks.onboard.clone().unwrap();
        hook.run_once = false;
        // Second input declared after the bot token; instructions live on
        // this one, yet they must still precede the first prompt
        hook.inputs[0].instructions = None;
        hook.inputs.push(HookInput {
            env_var: "CHAT_APP_TOKEN".to_string(),
            prompt: "Chat app token".to_string(),
            prefix: Some("app-".to_string()),
            instructions: Some("Create a bot and copy its tokens.".to_string()),
        });

        let mut acc = AutoResolved::default();
        let mut prompter = ScriptedPrompter::new(["bot-one", "app-two"]);
        let outcome = runner(&registry, &dict)
            .run_onboard(
                &seed(),
                &plugin,
                &hook,
                &ResolvedSecrets::default(),
                &mut acc,
                &mut prompter,
            )
            .unwrap();

        assert!(matches!(outcome, OnboardOutcome::Completed { .. }));
        assert_eq!(prompter.prompts, vec!["Chat bot token", "Chat app token"]);
        assert_eq!(prompter.shown, vec!["Create a bot and copy its tokens."]);
        assert_eq!(acc.get("agent-eng", "chatBotToken"), Some("bot-one"));
        assert_eq!(acc.get("agent-eng", "chatAppToken"), Some("app-two"));
    }

    #[test]
    fn test_cancellation_is_fatal() {
        let registry = PluginRegistry::load().unwrap();
        let dict = env(&[]);
        let plugin = test_plugin("exit 0", "exit 0");
        let mut hook = plugin.manifest.hooks.onboard.clone().unwrap();
        hook.run_once = false;

        let mut acc = AutoResolved::default();
        let mut prompter = ScriptedPrompter::default(); // no answers: EOF
        let err = runner(&registry, &dict)
            .run_onboard(
                &seed(),
                &plugin,
                &hook,
                &ResolvedSecrets::default(),
                &mut acc,
                &mut prompter,
            )
            .unwrap_err();
        assert!(matches!(err, FleetError::Cancelled));
    }

    #[test]
    fn test_instructions_redacted() {
        let registry = PluginRegistry::load().unwrap();
        let dict = env(&[("CHAT_BOT_TOKEN", "bot-supersecret")]);
        let plugin = test_plugin("echo \"Now run: export CHAT_BOT_TOKEN=$CHAT_BOT_TOKEN\"", "exit 0");
        let mut hook = plugin.manifest.hooks.onboard.clone().unwrap();
        hook.run_once = false;

        let mut acc = AutoResolved::default();
        let mut prompter = ScriptedPrompter::default();
        let outcome = runner(&registry, &dict)
            .run_onboard(
                &seed(),
                &plugin,
                &hook,
                &ResolvedSecrets::default(),
                &mut acc,
                &mut prompter,
            )
            .unwrap();

        let OnboardOutcome::Completed { instructions: Some(text) } = outcome else {
            panic!("expected instructions");
        };
        assert!(!text.contains("bot-supersecret"));
        assert!(text.contains("[redacted:chatBotToken]"));
    }

    #[test]
    fn test_non_sensitive_values_survive_redaction() {
        let registry = PluginRegistry::load().unwrap();
        let dict = env(&[("CHAT_BOT_TOKEN", "bot-supersecret")]);
        let plugin = test_plugin("echo \"Invite the bot in workspace T0042-team\"", "exit 0");
        let mut hook = plugin.manifest.hooks.onboard.clone().unwrap();
        hook.run_once = false;

        let mut acc = AutoResolved::default();
        // slackTeamId is declared non-sensitive by its descriptor
        acc.insert("agent-eng", "slackTeamId", "SLACK_TEAM_ID", "T0042-team".to_string());

        let mut prompter = ScriptedPrompter::default();
        let outcome = runner(&registry, &dict)
            .run_onboard(
                &seed(),
                &plugin,
                &hook,
                &ResolvedSecrets::default(),
                &mut acc,
                &mut prompter,
            )
            .unwrap();

        let OnboardOutcome::Completed { instructions: Some(text) } = outcome else {
            panic!("expected instructions");
        };
        assert!(text.contains("T0042-team"));
    }

    #[test]
    fn test_hook_failure_is_fatal_with_remediation() {
        let registry = PluginRegistry::load().unwrap();
        let dict = env(&[("CHAT_BOT_TOKEN", "bot-abc")]);
        let plugin = test_plugin("echo nope >&2; exit 2", "exit 0");
        let mut hook = plugin.manifest.hooks.onboard.clone().unwrap();
        hook.run_once = false;

        let mut acc = AutoResolved::default();
        let mut prompter = ScriptedPrompter::default();
        let err = runner(&registry, &dict)
            .run_onboard(
                &seed(),
                &plugin,
                &hook,
                &ResolvedSecrets::default(),
                &mut acc,
                &mut prompter,
            )
            .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("agent-eng"));
        assert!(msg.contains("nope"));
        assert!(msg.contains("environment variables directly"));
    }

    #[test]
    fn test_resolve_hook_fills_accumulator() {
        let registry = PluginRegistry::load().unwrap();
        let dict = env(&[("ENG_CHAT_BOT_TOKEN", "bot-abc")]);
        let plugin = test_plugin("exit 0", "echo CHAT_TEAM_ID=T0042");
        let hook = plugin.manifest.hooks.resolve.clone().unwrap();

        let mut acc = AutoResolved::default();
        runner(&registry, &dict)
            .run_resolve(&seed(), &plugin, &hook, &ResolvedSecrets::default(), &mut acc)
            .unwrap();

        assert_eq!(acc.get("agent-eng", "chatTeamId"), Some("T0042"));
        assert_eq!(acc.lookup_env("ENG_CHAT_TEAM_ID"), Some("T0042"));
    }

    #[test]
    fn test_resolve_hook_skipped_when_already_known() {
        let registry = PluginRegistry::load().unwrap();
        let dict = env(&[]);
        // Script would fail if invoked; prior accumulator value prevents it
        let plugin = test_plugin("exit 0", "exit 1");
        let hook = plugin.manifest.hooks.resolve.clone().unwrap();

        let mut acc = AutoResolved::default();
        acc.insert("agent-eng", "chatTeamId", "CHAT_TEAM_ID", "T0042".to_string());
        runner(&registry, &dict)
            .run_resolve(&seed(), &plugin, &hook, &ResolvedSecrets::default(), &mut acc)
            .unwrap();
    }

    #[test]
    fn test_resolve_hook_failure_is_fatal() {
        let registry = PluginRegistry::load().unwrap();
        let dict = env(&[]);
        let plugin = test_plugin("exit 0", "echo cannot reach api >&2; exit 1");
        let hook = plugin.manifest.hooks.resolve.clone().unwrap();

        let mut acc = AutoResolved::default();
        let err = runner(&registry, &dict)
            .run_resolve(&seed(), &plugin, &hook, &ResolvedSecrets::default(), &mut acc)
            .unwrap_err();
        assert!(matches!(err, FleetError::HookFailure { .. }));
    }
}
