//! Technology-stack detection from an npm `package.json` manifest.
//!
//! Exact-match lookup only: no fuzzy matching, no version awareness, and
//! unknown packages are dropped rather than reported.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechCategory {
    Frontend,
    Backend,
    Database,
    Infrastructure,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechStackItem {
    pub name: String,
    pub category: TechCategory,
}

struct KnownPackage {
    package: &'static str,
    name: &'static str,
    category: TechCategory,
}

const fn known(package: &'static str, name: &'static str, category: TechCategory) -> KnownPackage {
    KnownPackage {
        package,
        name,
        category,
    }
}

/// Output order follows this table, so detection is stable no matter how the
/// manifest orders its keys.
const KNOWN_PACKAGES: &[KnownPackage] = &[
    // Frontend
    known("react", "React", TechCategory::Frontend),
    known("next", "Next.js", TechCategory::Frontend),
    known("vue", "Vue", TechCategory::Frontend),
    known("nuxt", "Nuxt", TechCategory::Frontend),
    known("svelte", "Svelte", TechCategory::Frontend),
    known("@sveltejs/kit", "SvelteKit", TechCategory::Frontend),
    known("astro", "Astro", TechCategory::Frontend),
    known("@angular/core", "Angular", TechCategory::Frontend),
    known("solid-js", "Solid", TechCategory::Frontend),
    known("tailwindcss", "Tailwind CSS", TechCategory::Frontend),
    known("framer-motion", "Framer Motion", TechCategory::Frontend),
    known("three", "Three.js", TechCategory::Frontend),
    known("@tanstack/react-query", "TanStack Query", TechCategory::Frontend),
    known("zustand", "Zustand", TechCategory::Frontend),
    known("redux", "Redux", TechCategory::Frontend),
    known("@reduxjs/toolkit", "Redux", TechCategory::Frontend),
    // Backend
    known("express", "Express", TechCategory::Backend),
    known("fastify", "Fastify", TechCategory::Backend),
    known("hono", "Hono", TechCategory::Backend),
    known("@nestjs/core", "NestJS", TechCategory::Backend),
    known("graphql", "GraphQL", TechCategory::Backend),
    known("@trpc/server", "tRPC", TechCategory::Backend),
    known("socket.io", "Socket.IO", TechCategory::Backend),
    known("stripe", "Stripe", TechCategory::Backend),
    known("resend", "Resend", TechCategory::Backend),
    // Database
    known("@supabase/supabase-js", "Supabase", TechCategory::Database),
    known("prisma", "Prisma", TechCategory::Database),
    known("@prisma/client", "Prisma", TechCategory::Database),
    known("drizzle-orm", "Drizzle", TechCategory::Database),
    known("mongoose", "MongoDB", TechCategory::Database),
    known("mongodb", "MongoDB", TechCategory::Database),
    known("pg", "PostgreSQL", TechCategory::Database),
    known("mysql2", "MySQL", TechCategory::Database),
    known("redis", "Redis", TechCategory::Database),
    known("ioredis", "Redis", TechCategory::Database),
    known("firebase", "Firebase", TechCategory::Database),
    // Infrastructure
    known("wrangler", "Cloudflare", TechCategory::Infrastructure),
    known("@cloudflare/workers-types", "Cloudflare", TechCategory::Infrastructure),
    known("vercel", "Vercel", TechCategory::Infrastructure),
    known("@vercel/analytics", "Vercel", TechCategory::Infrastructure),
    known("aws-sdk", "AWS", TechCategory::Infrastructure),
    known("@aws-sdk/client-s3", "AWS", TechCategory::Infrastructure),
    known("docker-compose", "Docker", TechCategory::Infrastructure),
    // Tooling
    known("typescript", "TypeScript", TechCategory::Other),
    known("vite", "Vite", TechCategory::Other),
    known("webpack", "Webpack", TechCategory::Other),
    known("vitest", "Vitest", TechCategory::Other),
    known("jest", "Jest", TechCategory::Other),
    known("@playwright/test", "Playwright", TechCategory::Other),
    known("eslint", "ESLint", TechCategory::Other),
];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    #[serde(default)]
    dependencies: Option<Map<String, Value>>,
    #[serde(default)]
    dev_dependencies: Option<Map<String, Value>>,
}

/// Maps dependency names through the lookup table.
///
/// Several packages can share a display name (`prisma` / `@prisma/client`);
/// each display name appears once.
pub fn map_dependencies<'a, I>(dependencies: I) -> Vec<TechStackItem>
where
    I: IntoIterator<Item = &'a str>,
{
    let present: HashSet<&str> = dependencies.into_iter().collect();
    let mut seen = HashSet::new();
    KNOWN_PACKAGES
        .iter()
        .filter(|k| present.contains(k.package))
        .filter(|k| seen.insert(k.name))
        .map(|k| TechStackItem {
            name: k.name.to_string(),
            category: k.category,
        })
        .collect()
}

/// Parses manifest text and maps the union of `dependencies` and
/// `devDependencies`. A manifest with neither group yields an empty list.
pub fn detect_from_manifest(text: &str) -> Result<Vec<TechStackItem>, serde_json::Error> {
    let manifest: Manifest = serde_json::from_str(text)?;
    let names = manifest
        .dependencies
        .iter()
        .chain(manifest.dev_dependencies.iter())
        .flat_map(|group| group.keys().map(String::as_str));
    Ok(map_dependencies(names))
}
