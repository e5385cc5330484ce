//! Prompt templates for the three gateway operations

const START_GOAL_TEMPLATE: &str = "You are an autonomous task creation AI called `{name}`. You have the following objective `{goal}`. Create a list of zero to three tasks to be completed by your AI system such that your goal is more closely reached or completely reached. Return the response as an array of strings that can be used in JSON.parse()";

const EXECUTE_TASK_TEMPLATE: &str = "You are an autonomous task execution AI called `{name}`. You have the following objective `{goal}`. You have the following tasks `{task}`. Execute the task and return the response as a string.";

const CREATE_TASK_TEMPLATE: &str = "You are an AI task creation agent. You have the following objective `{goal}`. You have the following incomplete tasks `{tasks}` and have already completed the following tasks `{completed}`. You have just executed the following task `{last_task}` and received the following result `{result}`. Based on this, create a new task to be completed by your AI system ONLY IF NEEDED such that your goal is more closely reached or completely reached. Return the response as an array of strings that can be used in JSON.parse() and NOTHING ELSE";

/// Substitute `{slot}` placeholders in a single pass
fn render(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after
            .find('}')
            .and_then(|close| {
                let key = &after[..close];
                slots
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| (*v, close))
            });

        match value {
            Some((v, close)) => {
                out.push_str(v);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn json_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

/// Renders the prompts, optionally prefixed with a response-language directive
#[derive(Debug, Clone, Default)]
pub struct PromptSet {
    language: Option<String>,
}

impl PromptSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language.filter(|l| !l.trim().is_empty());
        self
    }

    fn finish(&self, body: String) -> String {
        match &self.language {
            Some(lang) => format!("Respond in {lang}. {body}"),
            None => body,
        }
    }

    pub fn start_goal(&self, name: &str, goal: &str) -> String {
        self.finish(render(START_GOAL_TEMPLATE, &[("name", name), ("goal", goal)]))
    }

    pub fn execute_task(&self, name: &str, goal: &str, task: &str) -> String {
        self.finish(render(
            EXECUTE_TASK_TEMPLATE,
            &[("name", name), ("goal", goal), ("task", task)],
        ))
    }

    pub fn create_tasks(
        &self,
        goal: &str,
        pending: &[String],
        last_task: &str,
        result: &str,
        completed: &[String],
    ) -> String {
        let tasks = json_list(pending);
        let completed = json_list(completed);
        self.finish(render(
            CREATE_TASK_TEMPLATE,
            &[
                ("goal", goal),
                ("tasks", tasks.as_str()),
                ("completed", completed.as_str()),
                ("last_task", last_task),
                ("result", result),
            ],
        ))
    }
}
