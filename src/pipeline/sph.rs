use anyhow::Result;

use super::Error;

/// One sphere record from a .sph file.
#[derive(Debug, Clone, PartialEq)]
pub struct Sphere {
    pub index: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub radius: f64,
    /// whatever trails the coordinates (surface point, critical cluster...);
    /// carried through untouched
    pub trailing: String,
}

/// A parsed sphere file: cluster headers kept verbatim, spheres editable.
#[derive(Debug, Clone)]
pub struct SphereFile {
    pub headers: Vec<String>,
    pub spheres: Vec<Sphere>,
}

impl SphereFile {
    /// Parse sphere file text. Lines whose first token is not an integer are
    /// treated as cluster headers and preserved as-is.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let mut headers = Vec::new();
        let mut spheres = Vec::new();
        for line in text.lines() {
            let mut tokens = line.split_whitespace();
            let first = match tokens.next() {
                Some(t) => t,
                None => continue,
            };
            let Ok(index) = first.parse::<i64>() else {
                headers.push(line.to_owned());
                continue;
            };
            let mut coord = |name: &'static str| -> Result<f64, Error> {
                tokens
                    .next()
                    .and_then(|t| t.parse().ok())
                    .ok_or(Error::MalformedSphereLine(name))
            };
            let x = coord("x")?;
            let y = coord("y")?;
            let z = coord("z")?;
            let radius = coord("radius")?;
            let trailing = tokens.collect::<Vec<_>>().join(" ");
            spheres.push(Sphere {
                index,
                x,
                y,
                z,
                radius,
                trailing,
            });
        }
        Ok(Self { headers, spheres })
    }

    /// Render back to .sph text.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.headers.len() * 32 + self.spheres.len() * 64);
        for header in &self.headers {
            out.push_str(header);
            out.push('\n');
        }
        for s in &self.spheres {
            out.push_str(&format!(
                "{:5} {:10.5} {:10.5} {:10.5} {:8.3}",
                s.index, s.x, s.y, s.z, s.radius
            ));
            if !s.trailing.is_empty() {
                out.push(' ');
                out.push_str(&s.trailing);
            }
            out.push('\n');
        }
        out
    }
}
