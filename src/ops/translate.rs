use super::types::{InvalidRequest, OpKind, OperationRequest};

/// A fully-assembled docker invocation plus the name used for the
/// at-most-one-concurrent-task exclusion check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPlan {
    pub args: Vec<String>,
    pub target: String,
}

/// Map a request to the exact docker argument vector.
///
/// Pure: identical input always yields an identical plan. A missing required
/// field fails with [`InvalidRequest`] and never produces a partial vector.
pub fn translate(req: &OperationRequest) -> Result<CommandPlan, InvalidRequest> {
    match req.kind {
        OpKind::Build => {
            let image = image_ref(req)?;
            let context = req
                .context
                .as_ref()
                .ok_or_else(|| missing(req.kind, "a Dockerfile context path"))?;
            Ok(CommandPlan {
                args: vec![
                    "build".into(),
                    "-t".into(),
                    image.clone(),
                    context.display().to_string(),
                ],
                target: image,
            })
        }
        OpKind::Run => {
            let image = image_ref(req)?;
            let container = container_name(req)?;
            let mut args = vec!["run".into(), "-d".into(), "--name".into(), container.clone()];
            for port in &req.ports {
                args.push("-p".into());
                args.push(port.to_string());
            }
            args.extend(req.extra_flags.iter().cloned());
            args.push(image);
            Ok(CommandPlan {
                args,
                target: container,
            })
        }
        OpKind::Push => {
            let image = image_ref(req)?;
            Ok(CommandPlan {
                args: vec!["push".into(), image.clone()],
                target: image,
            })
        }
        OpKind::Stop => {
            let container = container_name(req)?;
            Ok(CommandPlan {
                args: vec!["stop".into(), container.clone()],
                target: container,
            })
        }
        OpKind::Remove => {
            // A container name takes precedence; otherwise remove the image.
            if let Ok(container) = container_name(req) {
                Ok(CommandPlan {
                    args: vec!["rm".into(), container.clone()],
                    target: container,
                })
            } else if req.image.as_deref().is_some_and(|s| !s.is_empty()) {
                let image = image_ref(req)?;
                Ok(CommandPlan {
                    args: vec!["rmi".into(), "-f".into(), image.clone()],
                    target: image,
                })
            } else {
                Err(missing(req.kind, "a container or image identifier"))
            }
        }
        OpKind::Commit => {
            let container = container_name(req)?;
            let image = image_ref(req)?;
            Ok(CommandPlan {
                args: vec!["commit".into(), container.clone(), image],
                target: container,
            })
        }
    }
}

/// `image:tag`, defaulting the tag to `latest`.
fn image_ref(req: &OperationRequest) -> Result<String, InvalidRequest> {
    let image = req
        .image
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing(req.kind, "an image name"))?;
    let tag = req.tag.as_deref().filter(|s| !s.is_empty()).unwrap_or("latest");
    Ok(format!("{image}:{tag}"))
}

fn container_name(req: &OperationRequest) -> Result<String, InvalidRequest> {
    req.container
        .clone()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing(req.kind, "a container name"))
}

fn missing(kind: OpKind, what: &str) -> InvalidRequest {
    InvalidRequest(format!("{kind} requires {what}"))
}
