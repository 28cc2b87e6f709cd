use crate::error::AppError;
use crate::model::SubTask;
use crate::notify::{Notifier, launch_show, open_activated, parse_activation_argument, prompt_text};
use tauri_winrt_notification::Toast;

pub struct WindowsNotifier;

impl Notifier for WindowsNotifier {
    fn notify(&self, task: &SubTask) -> Result<(), AppError> {
        self.notify_with_action(task, "")
    }

    fn notify_with_action(&self, task: &SubTask, action: &str) -> Result<(), AppError> {
        let (title, body) = prompt_text(task);
        let task_id = task.id.clone();
        let action_value = action.to_string();
        let mut toast = Toast::new(Toast::POWERSHELL_APP_ID)
            .title(&title)
            .text1(&body)
            .text2(&task.goal);

        if !action_value.trim().is_empty() {
            toast = toast.add_button("Check in", &action_value);
        }

        let action_match = action_value.clone();
        toast
            .on_activated(move |args| {
                let target = match args {
                    Some(args) if !action_match.is_empty() && args == action_match => {
                        Some(task_id.clone())
                    }
                    Some(args) if args.trim().is_empty() => Some(task_id.clone()),
                    Some(args) => parse_activation_argument(&args),
                    None => Some(task_id.clone()),
                };
                if let Some(id) = target {
                    open_activated(&id, launch_show);
                }
                Ok(())
            })
            .show()
            .map_err(|err| AppError::io(err.to_string()))?;
        Ok(())
    }
}
