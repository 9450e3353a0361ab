use super::types::{ContainerSummary, ImageSummary};

/// `--format` string handed to `docker ps -a`.
pub const PS_FORMAT: &str = "{{.ID}}\t{{.Names}}\t{{.Image}}\t{{.Status}}\t{{.Ports}}";

/// `--format` string handed to `docker images`.
pub const IMAGES_FORMAT: &str = "{{.Repository}}\t{{.Tag}}\t{{.ID}}\t{{.Size}}";

/// Parse tab-separated `docker ps` output. Malformed lines are skipped.
pub fn parse_containers(text: &str) -> Vec<ContainerSummary> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            let [id, name, image, status, ports] = fields.as_slice() else {
                return None;
            };
            Some(ContainerSummary {
                id: id.to_string(),
                name: name.to_string(),
                image: image.to_string(),
                status: status.to_string(),
                ports: ports.to_string(),
            })
        })
        .collect()
}

/// Parse tab-separated `docker images` output. Malformed lines are skipped.
pub fn parse_images(text: &str) -> Vec<ImageSummary> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            let [repository, tag, id, size] = fields.as_slice() else {
                return None;
            };
            Some(ImageSummary {
                id: id.to_string(),
                repository: repository.to_string(),
                tag: tag.to_string(),
                size: size.to_string(),
            })
        })
        .collect()
}
