use crate::error::AppError;
use crate::model::SubTask;
use crate::notify::{Notifier, launch_show, open_activated, prompt_text};
use notify_rust::Notification;

pub struct LinuxNotifier;

impl Notifier for LinuxNotifier {
    fn notify(&self, task: &SubTask) -> Result<(), AppError> {
        self.notify_with_action(task, "")
    }

    fn notify_with_action(&self, task: &SubTask, action: &str) -> Result<(), AppError> {
        let (title, body) = prompt_text(task);
        let mut notification = Notification::new();
        notification.summary(&title);
        notification.body(&body);
        if !action.trim().is_empty() {
            notification.action(action, "Check in");
        }

        let handle = notification
            .show()
            .map_err(|err| AppError::io(err.to_string()))?;

        if !action.trim().is_empty() {
            let action_key = action.to_string();
            let task_id = task.id.clone();
            std::thread::spawn(move || {
                let _ = handle.wait_for_action(|selected| {
                    if selected == action_key || selected == "default" {
                        open_activated(&task_id, launch_show);
                    }
                });
            });
        }

        Ok(())
    }
}
